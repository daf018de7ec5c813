//! Command handlers and the shared runtime context.

pub mod auth;
pub mod export;
pub mod status;
pub mod store_cmd;
pub mod vehicles;
pub mod watch;

use std::sync::Arc;

use secrecy::SecretString;
use tracing::warn;

use rivtel_api::{RivianClient, VehicleApi, VehicleSummary};
use rivtel_core::{Config, CredentialsCache, SessionManager, SessionStatus, SnapshotStore};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything a command handler needs: merged config (flags > env >
/// file > defaults), the wire client, and session management.
pub struct Ctx {
    pub config: Config,
    pub client: Arc<RivianClient>,
    pub session: SessionManager,
}

impl Ctx {
    /// Build the context, applying CLI-flag precedence over the loaded
    /// config.
    pub fn new(global: &GlobalOpts) -> Result<Self, CliError> {
        let mut config = Config::load_or_default();
        if let Some(ref email) = global.email {
            config.email = Some(email.clone());
        }
        if let Some(vehicle) = global.vehicle {
            config.vehicle = vehicle;
        }
        if let Some(ref db) = global.db {
            config.db_path = Some(db.clone());
        }
        if global.quiet {
            config.quiet = true;
        }

        let client = Arc::new(RivianClient::new().map_err(CliError::from)?);
        let cache = CredentialsCache::new(config.token_cache_path());
        let session = SessionManager::new(client.clone() as Arc<dyn VehicleApi>, cache);

        Ok(Self {
            config,
            client,
            session,
        })
    }

    /// Open the snapshot store, degrading to live-only operation when it
    /// is disabled or unavailable.
    pub fn open_store(&self) -> Option<Arc<SnapshotStore>> {
        if self.config.disable_store {
            return None;
        }
        match SnapshotStore::open(self.config.db_path()) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "snapshot store unavailable, continuing live-only");
                None
            }
        }
    }

    /// Ensure an authenticated session for non-interactive commands.
    ///
    /// Order: persisted tokens (refreshing when stale), then a
    /// non-interactive login with configured email + password. Anything
    /// else is exit-code-1 territory; `rivtel auth login` is the
    /// interactive path.
    pub async fn require_auth(&self) -> Result<(), CliError> {
        if self.session.restore().await? == SessionStatus::Authenticated {
            // Refresh proactively when the restored tokens sit inside
            // the expiry buffer.
            self.session.ensure_fresh().await?;
            return Ok(());
        }

        let (Some(email), Some(password)) = (&self.config.email, &self.config.password) else {
            return Err(CliError::NotLoggedIn);
        };

        let password = SecretString::from(password.clone());
        match self.session.login(email, &password).await? {
            rivtel_api::LoginOutcome::LoggedIn => Ok(()),
            // A one-time code cannot be answered non-interactively.
            rivtel_api::LoginOutcome::OneTimeCodeRequired => Err(CliError::NotLoggedIn),
        }
    }

    /// Resolve the configured vehicle index against the account's list.
    pub async fn resolve_vehicle(&self) -> Result<VehicleSummary, CliError> {
        let vehicles = self.client.list_vehicles().await?;
        if vehicles.is_empty() {
            return Err(CliError::NotFound {
                kind: "vehicle".into(),
                identifier: "any".into(),
            });
        }

        let index = self.config.vehicle;
        vehicles
            .get(index)
            .cloned()
            .ok_or(CliError::VehicleIndexOutOfRange {
                index,
                count: vehicles.len(),
            })
    }
}
