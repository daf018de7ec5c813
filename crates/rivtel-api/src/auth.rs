//! Authentication mutations and session token types.
//!
//! The exchange is multi-step: `CreateCSRFToken` yields the per-session
//! `csrf-token` / `a-sess` pair, then `Login` either returns a full token
//! set or branches into the MFA flow (`LoginWithOTP`). `RefreshAccessToken`
//! consumes the stored refresh token. The `Login` result is a polymorphic
//! GraphQL union keyed on `__typename`; it is modelled as a tagged enum so
//! the payload is never read without checking the tag.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Assumed token lifetime. The wire does not return a precise TTL; if the
/// backend ever starts returning one, that value should supersede this.
pub const ASSUMED_TOKEN_TTL_HOURS: i64 = 24;

/// Validity buffer: tokens within 5 minutes of expiry are treated as stale.
pub const EXPIRY_BUFFER_MINUTES: i64 = 5;

// ── Mutation texts ───────────────────────────────────────────────────

pub(crate) const CREATE_CSRF_TOKEN_MUTATION: &str = r#"
    mutation CreateCSRFToken {
        createCsrfToken {
            __typename
            csrfToken
            appSessionToken
        }
    }
"#;

pub(crate) const LOGIN_MUTATION: &str = r#"
    mutation Login($email: String!, $password: String!) {
        login(email: $email, password: $password) {
            __typename
            ... on MobileLoginResponse {
                accessToken
                refreshToken
                userSessionToken
            }
            ... on MobileMFALoginResponse {
                otpToken
            }
        }
    }
"#;

pub(crate) const LOGIN_WITH_OTP_MUTATION: &str = r#"
    mutation LoginWithOTP($email: String!, $otpCode: String!, $otpToken: String!) {
        loginWithOTP(email: $email, otpCode: $otpCode, otpToken: $otpToken) {
            __typename
            accessToken
            refreshToken
            userSessionToken
        }
    }
"#;

pub(crate) const REFRESH_TOKEN_MUTATION: &str = r#"
    mutation RefreshAccessToken($refreshToken: String!) {
        refreshAccessToken(refreshToken: $refreshToken) {
            accessToken
            refreshToken
        }
    }
"#;

// ── Session tokens ───────────────────────────────────────────────────

/// The token set held after a successful login.
///
/// `user_session_token` is what the gateway authenticates queries with
/// (the `u-sess` header). The `access_token` the backend also returns is
/// retained but unused by subsequent requests -- that matches observed
/// backend behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_session_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    /// Build a credential set expiring after the assumed TTL.
    pub fn with_assumed_ttl(
        user_session_token: String,
        access_token: String,
        refresh_token: String,
    ) -> Self {
        Self {
            user_session_token,
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::hours(ASSUMED_TOKEN_TTL_HOURS),
        }
    }

    /// `true` iff the tokens are more than the expiry buffer away from
    /// their assumed expiry.
    pub fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now() + Duration::minutes(EXPIRY_BUFFER_MINUTES)
    }
}

/// Outcome of the password login step.
///
/// `OneTimeCodeRequired` is a protocol branch, not an error: the client
/// has stored the continuation token and expects
/// [`submit_one_time_code`](crate::RivianClient::submit_one_time_code)
/// next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    OneTimeCodeRequired,
}

// ── Wire response shapes ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct CsrfTokenData {
    #[serde(rename = "createCsrfToken")]
    pub create_csrf_token: CsrfTokenResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CsrfTokenResult {
    pub csrf_token: String,
    pub app_session_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub login: LoginResult,
}

/// Polymorphic `Login` result, tagged on `__typename`.
#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
pub(crate) enum LoginResult {
    #[serde(rename = "MobileLoginResponse", rename_all = "camelCase")]
    Success {
        access_token: String,
        refresh_token: String,
        user_session_token: String,
    },
    #[serde(rename = "MobileMFALoginResponse", rename_all = "camelCase")]
    MfaRequired { otp_token: String },
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginWithOtpData {
    #[serde(rename = "loginWithOTP")]
    pub login_with_otp: LoginWithOtpResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginWithOtpResult {
    pub access_token: String,
    pub refresh_token: String,
    pub user_session_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshData {
    #[serde(rename = "refreshAccessToken")]
    pub refresh_access_token: RefreshResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResult {
    pub access_token: String,
    pub refresh_token: String,
}
