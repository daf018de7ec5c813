// HTTPS GraphQL client
//
// Wraps `reqwest::Client` with gateway-specific request construction,
// session-header injection, and the GraphQL `{data, errors}` envelope.
// Vehicle queries live in `vehicles.rs` as inherent methods; this module
// owns transport mechanics and the authentication exchange.

use std::sync::RwLock;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::auth::{
    Credentials, CsrfTokenData, LoginData, LoginOutcome, LoginResult, LoginWithOtpData,
    RefreshData, CREATE_CSRF_TOKEN_MUTATION, LOGIN_MUTATION, LOGIN_WITH_OTP_MUTATION,
    REFRESH_TOKEN_MUTATION,
};
use crate::error::Error;
use crate::transport::TransportConfig;
use crate::types::{VehicleStateRecord, VehicleSummary};

/// Read-only snapshot of the session tokens shared by both transports.
///
/// Produced by [`RivianClient::session_headers`] and consumed by the
/// WebSocket dialer. Fields are optional because the WebSocket attempt may
/// legitimately happen before full bootstrap -- the gateway then rejects
/// the handshake, which the coordinator treats as a polling-fallback
/// signal.
#[derive(Debug, Clone, Default)]
pub struct SessionHeaders {
    pub app_session_token: Option<String>,
    pub csrf_token: Option<String>,
    pub user_session_token: Option<String>,
}

/// Mutable session state behind the client's lock.
///
/// Mutated only by the authentication methods; every request takes a
/// point-in-time snapshot before performing I/O.
#[derive(Debug, Default)]
struct SessionState {
    credentials: Option<Credentials>,
    csrf_token: Option<String>,
    app_session_token: Option<String>,
    // MFA continuation: otp token + the email it was issued for.
    otp_token: Option<String>,
    pending_email: Option<String>,
}

/// Capability set the rest of the system programs against.
///
/// One real implementation ([`RivianClient`]) and in-memory fakes in
/// tests.
#[async_trait]
pub trait VehicleApi: Send + Sync {
    /// CSRF + password exchange. May branch into the MFA flow.
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, Error>;

    /// Complete a pending MFA exchange with the emailed code.
    async fn submit_one_time_code(&self, code: &str) -> Result<(), Error>;

    /// Exchange the stored refresh token for a new token set.
    async fn refresh_session(&self) -> Result<(), Error>;

    /// Re-run the CSRF mutation for fresh `csrf-token` / `a-sess` values.
    /// Required before a WebSocket attempt: stale values cause handshake
    /// failure.
    async fn create_session(&self) -> Result<(), Error>;

    /// List the account's vehicles.
    async fn list_vehicles(&self) -> Result<Vec<VehicleSummary>, Error>;

    /// Fetch the full state snapshot for one vehicle.
    async fn vehicle_state(&self, vehicle_id: &str) -> Result<VehicleStateRecord, Error>;

    /// `true` iff credentials exist and are outside the expiry buffer.
    fn is_authenticated(&self) -> bool;

    /// Copy of the current credentials, if any.
    fn credentials(&self) -> Option<Credentials>;

    /// Replace the credentials (cache restore).
    fn set_credentials(&self, credentials: Credentials);

    /// Session-token snapshot for the WebSocket handshake.
    fn session_headers(&self) -> SessionHeaders;
}

/// The real HTTPS client against the gateway.
pub struct RivianClient {
    http: reqwest::Client,
    graphql_url: Url,
    session: RwLock<SessionState>,
}

impl RivianClient {
    /// Create a client against the production gateway.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(crate::BASE_URL.parse()?, &TransportConfig::default())
    }

    /// Create a client against a custom base URL (tests).
    pub fn with_base_url(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let graphql_url = base_url.join(crate::GRAPHQL_PATH)?;
        Ok(Self {
            http: transport.build_client()?,
            graphql_url,
            session: RwLock::new(SessionState::default()),
        })
    }

    // ── GraphQL execution ────────────────────────────────────────────

    /// Execute a GraphQL document and deserialize `data` into `T`.
    ///
    /// Success means HTTP 200 AND an absent/empty `errors` array; a
    /// non-empty `errors` array fails with the first message verbatim.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<T, Error> {
        let mut body = json!({ "query": query });
        if let Some(vars) = variables {
            body["variables"] = vars;
        }

        let mut request = self
            .http
            .post(self.graphql_url.clone())
            .header("apollographql-client-name", crate::APOLLO_CLIENT_NAME)
            .json(&body);

        // Point-in-time session snapshot; never hold the lock across I/O.
        {
            let session = self.session.read().expect("session lock poisoned");
            if let Some(ref app) = session.app_session_token {
                request = request.header("a-sess", app.as_str());
            }
            if let Some(ref csrf) = session.csrf_token {
                request = request.header("csrf-token", csrf.as_str());
            }
            if let Some(ref creds) = session.credentials {
                request = request.header("u-sess", creds.user_session_token.as_str());
            }
        }

        debug!(url = %self.graphql_url, "POST GraphQL");
        let response = request.send().await.map_err(Error::Http)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GraphQlResponse = response.json().await.map_err(Error::Http)?;
        if let Some(first) = envelope.errors.into_iter().next() {
            return Err(Error::Protocol {
                message: first.message,
            });
        }

        serde_json::from_value(envelope.data.unwrap_or(serde_json::Value::Null))
            .map_err(Error::Decode)
    }

    // ── Authentication exchange ──────────────────────────────────────

    /// Perform the CSRF step, storing fresh `csrf-token` / `a-sess`
    /// values for subsequent calls on both transports.
    pub async fn create_session(&self) -> Result<(), Error> {
        let data: CsrfTokenData = self.execute(CREATE_CSRF_TOKEN_MUTATION, None).await?;

        let mut session = self.session.write().expect("session lock poisoned");
        session.csrf_token = Some(data.create_csrf_token.csrf_token);
        session.app_session_token = Some(data.create_csrf_token.app_session_token);
        Ok(())
    }

    /// CSRF + password login.
    ///
    /// Returns [`LoginOutcome::OneTimeCodeRequired`] when the account has
    /// MFA enabled; the continuation token and email are stored for the
    /// follow-up [`submit_one_time_code`](Self::submit_one_time_code).
    pub async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, Error> {
        self.create_session().await?;

        {
            let mut session = self.session.write().expect("session lock poisoned");
            session.pending_email = Some(email.to_string());
        }

        let variables = json!({
            "email": email,
            "password": password.expose_secret(),
        });
        let data: LoginData = self.execute(LOGIN_MUTATION, Some(variables)).await?;

        let mut session = self.session.write().expect("session lock poisoned");
        match data.login {
            LoginResult::Success {
                access_token,
                refresh_token,
                user_session_token,
            } => {
                session.credentials = Some(Credentials::with_assumed_ttl(
                    user_session_token,
                    access_token,
                    refresh_token,
                ));
                session.otp_token = None;
                session.pending_email = None;
                debug!("password login succeeded");
                Ok(LoginOutcome::LoggedIn)
            }
            LoginResult::MfaRequired { otp_token } => {
                session.otp_token = Some(otp_token);
                debug!("login requires one-time code");
                Ok(LoginOutcome::OneTimeCodeRequired)
            }
        }
    }

    /// Complete the MFA exchange with the emailed one-time code.
    ///
    /// Requires a pending MFA session (stored otp token + email) from a
    /// prior [`authenticate`](Self::authenticate) call; both are cleared
    /// on success.
    pub async fn submit_one_time_code(&self, code: &str) -> Result<(), Error> {
        let (otp_token, email) = {
            let session = self.session.read().expect("session lock poisoned");
            match (&session.otp_token, &session.pending_email) {
                (Some(token), Some(email)) => (token.clone(), email.clone()),
                _ => return Err(Error::NoPendingOneTimeCode),
            }
        };

        let variables = json!({
            "email": email,
            "otpCode": code,
            "otpToken": otp_token,
        });
        let data: LoginWithOtpData = self.execute(LOGIN_WITH_OTP_MUTATION, Some(variables)).await?;

        let mut session = self.session.write().expect("session lock poisoned");
        session.credentials = Some(Credentials::with_assumed_ttl(
            data.login_with_otp.user_session_token,
            data.login_with_otp.access_token,
            data.login_with_otp.refresh_token,
        ));
        session.otp_token = None;
        session.pending_email = None;
        debug!("one-time-code login succeeded");
        Ok(())
    }

    /// Exchange the stored refresh token for new tokens.
    ///
    /// The gateway returns only `accessToken` + `refreshToken` here; the
    /// new access token becomes the `u-sess` value for subsequent calls.
    pub async fn refresh_session(&self) -> Result<(), Error> {
        let refresh_token = {
            let session = self.session.read().expect("session lock poisoned");
            session
                .credentials
                .as_ref()
                .map(|c| c.refresh_token.clone())
                .ok_or(Error::NotAuthenticated)?
        };

        let variables = json!({ "refreshToken": refresh_token });
        let data: RefreshData = self.execute(REFRESH_TOKEN_MUTATION, Some(variables)).await?;

        let mut session = self.session.write().expect("session lock poisoned");
        session.credentials = Some(Credentials::with_assumed_ttl(
            data.refresh_access_token.access_token.clone(),
            data.refresh_access_token.access_token,
            data.refresh_access_token.refresh_token,
        ));
        debug!("token refresh succeeded");
        Ok(())
    }

    // ── Session accessors ────────────────────────────────────────────

    pub fn is_authenticated(&self) -> bool {
        let session = self.session.read().expect("session lock poisoned");
        session
            .credentials
            .as_ref()
            .is_some_and(Credentials::is_fresh)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.session
            .read()
            .expect("session lock poisoned")
            .credentials
            .clone()
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        self.session
            .write()
            .expect("session lock poisoned")
            .credentials = Some(credentials);
    }

    /// Drop all session state (logout).
    pub fn clear_credentials(&self) {
        let mut session = self.session.write().expect("session lock poisoned");
        *session = SessionState::default();
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.session
            .read()
            .expect("session lock poisoned")
            .csrf_token
            .clone()
    }

    pub fn app_session_token(&self) -> Option<String> {
        self.session
            .read()
            .expect("session lock poisoned")
            .app_session_token
            .clone()
    }

    pub fn session_headers(&self) -> SessionHeaders {
        let session = self.session.read().expect("session lock poisoned");
        SessionHeaders {
            app_session_token: session.app_session_token.clone(),
            csrf_token: session.csrf_token.clone(),
            user_session_token: session
                .credentials
                .as_ref()
                .map(|c| c.user_session_token.clone()),
        }
    }
}

#[async_trait]
impl VehicleApi for RivianClient {
    async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, Error> {
        RivianClient::authenticate(self, email, password).await
    }

    async fn submit_one_time_code(&self, code: &str) -> Result<(), Error> {
        RivianClient::submit_one_time_code(self, code).await
    }

    async fn refresh_session(&self) -> Result<(), Error> {
        RivianClient::refresh_session(self).await
    }

    async fn create_session(&self) -> Result<(), Error> {
        RivianClient::create_session(self).await
    }

    async fn list_vehicles(&self) -> Result<Vec<VehicleSummary>, Error> {
        RivianClient::list_vehicles(self).await
    }

    async fn vehicle_state(&self, vehicle_id: &str) -> Result<VehicleStateRecord, Error> {
        RivianClient::vehicle_state(self, vehicle_id).await
    }

    fn is_authenticated(&self) -> bool {
        RivianClient::is_authenticated(self)
    }

    fn credentials(&self) -> Option<Credentials> {
        RivianClient::credentials(self)
    }

    fn set_credentials(&self, credentials: Credentials) {
        RivianClient::set_credentials(self, credentials);
    }

    fn session_headers(&self) -> SessionHeaders {
        RivianClient::session_headers(self)
    }
}

// ── GraphQL envelope ─────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, serde::Deserialize)]
struct GraphQlError {
    message: String,
}
