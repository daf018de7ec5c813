//! Session lifecycle policy.
//!
//! Drives the authentication state machine around the wire client:
//! restore persisted tokens at startup, refresh proactively when stale,
//! fall back to interactive login, and keep the on-disk cache in step
//! with every token acquisition. A failed refresh clears the cache so
//! the next start goes straight to interactive login.

use std::sync::Arc;
use std::sync::Mutex;

use secrecy::SecretString;
use tracing::{debug, warn};

use rivtel_api::{LoginOutcome, VehicleApi};

use crate::credentials::CredentialsCache;
use crate::error::CoreError;

/// Result of the startup restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Valid (possibly refreshed) tokens are loaded on the client.
    Authenticated,
    /// No usable persisted tokens; interactive login is required.
    NeedsLogin,
}

/// Owns session-token policy for one client + cache pair.
pub struct SessionManager {
    client: Arc<dyn VehicleApi>,
    cache: CredentialsCache,
    /// Email of the account whose tokens are loaded; needed to persist
    /// refreshed credentials.
    email: Mutex<Option<String>>,
}

impl SessionManager {
    pub fn new(client: Arc<dyn VehicleApi>, cache: CredentialsCache) -> Self {
        Self {
            client,
            cache,
            email: Mutex::new(None),
        }
    }

    /// Startup policy: load persisted credentials if present.
    ///
    /// Valid tokens go straight onto the client. Stale tokens get one
    /// refresh attempt; on failure the cache is deleted and interactive
    /// re-authentication is required.
    pub async fn restore(&self) -> Result<SessionStatus, CoreError> {
        let Some(cached) = self.cache.load()? else {
            return Ok(SessionStatus::NeedsLogin);
        };

        self.remember_email(&cached.email);

        if cached.is_valid() {
            self.client.set_credentials(cached.to_credentials());
            debug!("restored cached credentials");
            return Ok(SessionStatus::Authenticated);
        }

        // Stale: attempt a refresh with the persisted refresh token.
        self.client.set_credentials(cached.to_credentials());
        match self.client.refresh_session().await {
            Ok(()) => {
                self.persist(&cached.email);
                debug!("refreshed stale credentials");
                Ok(SessionStatus::Authenticated)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing cache");
                self.cache.delete()?;
                Ok(SessionStatus::NeedsLogin)
            }
        }
    }

    /// Password login step. Persists tokens unless MFA is pending.
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<LoginOutcome, CoreError> {
        self.remember_email(email);
        let outcome = self.client.authenticate(email, password).await?;
        if outcome == LoginOutcome::LoggedIn {
            self.persist(email);
        }
        Ok(outcome)
    }

    /// Complete a pending MFA exchange and persist the token set.
    pub async fn complete_one_time_code(&self, code: &str) -> Result<(), CoreError> {
        self.client.submit_one_time_code(code).await?;
        let email = self
            .email
            .lock()
            .expect("email lock poisoned")
            .clone()
            .unwrap_or_default();
        self.persist(&email);
        Ok(())
    }

    /// Proactive freshness check: refresh when inside the expiry buffer.
    ///
    /// A failed refresh deletes the cache and surfaces the error so the
    /// caller can re-authenticate (interactively or with exit code 1).
    pub async fn ensure_fresh(&self) -> Result<(), CoreError> {
        if self.client.is_authenticated() {
            return Ok(());
        }

        match self.client.refresh_session().await {
            Ok(()) => {
                let email = self
                    .email
                    .lock()
                    .expect("email lock poisoned")
                    .clone()
                    .unwrap_or_default();
                self.persist(&email);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "proactive refresh failed");
                self.cache.delete()?;
                Err(e.into())
            }
        }
    }

    /// Drop persisted tokens.
    pub fn logout(&self) -> Result<(), CoreError> {
        self.cache.delete()
    }

    pub fn cache(&self) -> &CredentialsCache {
        &self.cache
    }

    fn remember_email(&self, email: &str) {
        *self.email.lock().expect("email lock poisoned") = Some(email.to_string());
    }

    /// Write the client's current tokens to disk. Non-fatal on failure.
    fn persist(&self, email: &str) {
        if let Some(credentials) = self.client.credentials() {
            if let Err(e) = self.cache.save(email, &credentials) {
                warn!(error = %e, "could not persist credentials");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use rivtel_api::types::VehicleStateRecord;
    use rivtel_api::{Credentials, Error, SessionHeaders, VehicleSummary};

    #[derive(Default)]
    struct FakeApi {
        refresh_fails: bool,
        refresh_calls: AtomicUsize,
        authenticated: AtomicBool,
        credentials: std::sync::Mutex<Option<Credentials>>,
    }

    #[async_trait]
    impl VehicleApi for FakeApi {
        async fn authenticate(
            &self,
            _email: &str,
            _password: &SecretString,
        ) -> Result<LoginOutcome, Error> {
            self.authenticated.store(true, Ordering::SeqCst);
            *self.credentials.lock().unwrap() = Some(Credentials::with_assumed_ttl(
                "UST".into(),
                "AT".into(),
                "RT".into(),
            ));
            Ok(LoginOutcome::LoggedIn)
        }

        async fn submit_one_time_code(&self, _code: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn refresh_session(&self) -> Result<(), Error> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if self.refresh_fails {
                return Err(Error::Auth {
                    message: "refresh token rejected".into(),
                });
            }
            self.authenticated.store(true, Ordering::SeqCst);
            *self.credentials.lock().unwrap() = Some(Credentials::with_assumed_ttl(
                "UST-refreshed".into(),
                "AT-refreshed".into(),
                "RT-refreshed".into(),
            ));
            Ok(())
        }

        async fn create_session(&self) -> Result<(), Error> {
            Ok(())
        }

        async fn list_vehicles(&self) -> Result<Vec<VehicleSummary>, Error> {
            Ok(Vec::new())
        }

        async fn vehicle_state(&self, _vehicle_id: &str) -> Result<VehicleStateRecord, Error> {
            Ok(VehicleStateRecord::default())
        }

        fn is_authenticated(&self) -> bool {
            self.authenticated.load(Ordering::SeqCst)
        }

        fn credentials(&self) -> Option<Credentials> {
            self.credentials.lock().unwrap().clone()
        }

        fn set_credentials(&self, credentials: Credentials) {
            let fresh = credentials.is_fresh();
            *self.credentials.lock().unwrap() = Some(credentials);
            self.authenticated.store(fresh, Ordering::SeqCst);
        }

        fn session_headers(&self) -> SessionHeaders {
            SessionHeaders::default()
        }
    }

    fn manager(api: FakeApi) -> (tempfile::TempDir, Arc<FakeApi>, SessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let cache = CredentialsCache::new(dir.path().join("credentials.json"));
        let api = Arc::new(api);
        let session = SessionManager::new(api.clone() as Arc<dyn VehicleApi>, cache);
        (dir, api, session)
    }

    fn write_cached(cache: &CredentialsCache, expires_in: Duration) {
        let creds = Credentials {
            user_session_token: "UST-cached".into(),
            access_token: "UST-cached".into(),
            refresh_token: "RT-cached".into(),
            expires_at: Utc::now() + expires_in,
        };
        cache.save("a@b.com", &creds).unwrap();
    }

    #[tokio::test]
    async fn restore_with_no_cache_needs_login() {
        let (_dir, api, session) = manager(FakeApi::default());
        assert_eq!(session.restore().await.unwrap(), SessionStatus::NeedsLogin);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn restore_with_valid_cache_authenticates_without_refresh() {
        let (_dir, api, session) = manager(FakeApi::default());
        write_cached(session.cache(), Duration::hours(12));

        assert_eq!(
            session.restore().await.unwrap(),
            SessionStatus::Authenticated
        );
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.credentials().unwrap().user_session_token, "UST-cached");
    }

    #[tokio::test]
    async fn restore_with_stale_cache_refreshes_and_persists() {
        let (_dir, api, session) = manager(FakeApi::default());
        write_cached(session.cache(), Duration::minutes(1));

        assert_eq!(
            session.restore().await.unwrap(),
            SessionStatus::Authenticated
        );
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);

        // The refreshed tokens were written back to disk.
        let cached = session.cache().load().unwrap().unwrap();
        assert_eq!(cached.user_session_token, "UST-refreshed");
        assert_eq!(cached.email, "a@b.com");
    }

    #[tokio::test]
    async fn failed_refresh_clears_the_cache() {
        let (_dir, _api, session) = manager(FakeApi {
            refresh_fails: true,
            ..FakeApi::default()
        });
        write_cached(session.cache(), Duration::minutes(1));

        assert_eq!(session.restore().await.unwrap(), SessionStatus::NeedsLogin);
        assert!(session.cache().load().unwrap().is_none());
    }

    #[tokio::test]
    async fn login_persists_credentials() {
        let (_dir, _api, session) = manager(FakeApi::default());
        let password = SecretString::from("pw".to_string());

        let outcome = session.login("a@b.com", &password).await.unwrap();
        assert_eq!(outcome, LoginOutcome::LoggedIn);

        let cached = session.cache().load().unwrap().unwrap();
        assert_eq!(cached.email, "a@b.com");
        assert_eq!(cached.user_session_token, "UST");
    }

    #[tokio::test]
    async fn ensure_fresh_is_a_noop_when_authenticated() {
        let (_dir, api, session) = manager(FakeApi::default());
        api.set_credentials(Credentials::with_assumed_ttl(
            "UST".into(),
            "AT".into(),
            "RT".into(),
        ));

        session.ensure_fresh().await.unwrap();
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn logout_deletes_the_cache() {
        let (_dir, _api, session) = manager(FakeApi::default());
        write_cached(session.cache(), Duration::hours(12));

        session.logout().unwrap();
        assert!(session.cache().load().unwrap().is_none());
    }
}
