//! Persisted credential cache.
//!
//! A single JSON file under the user's config directory, owner
//! read/write only. The on-disk `access_token` field carries the user
//! session token -- the value the `u-sess` header needs -- which the
//! in-memory type names plainly to avoid confusion with the backend's
//! unused access token.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use rivtel_api::Credentials;

use crate::error::CoreError;

/// Tokens as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredentials {
    pub email: String,
    /// The user session token (`u-sess`), under its historical file key.
    #[serde(rename = "access_token")]
    pub user_session_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

impl CachedCredentials {
    /// `true` iff more than 5 minutes remain before expiry.
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now() + Duration::minutes(5)
    }

    /// Convert into live session credentials.
    pub fn to_credentials(&self) -> Credentials {
        Credentials {
            user_session_token: self.user_session_token.clone(),
            access_token: self.user_session_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Manages the credentials file.
pub struct CredentialsCache {
    path: PathBuf,
}

impl CredentialsCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache at the default per-user config location.
    pub fn default_location() -> Result<Self, CoreError> {
        let dirs = directories::ProjectDirs::from("com", "rivtel", "rivtel").ok_or_else(|| {
            CoreError::Config {
                message: "could not determine a config directory".into(),
            }
        })?;
        Ok(Self::new(dirs.config_dir().join("credentials.json")))
    }

    /// Read cached credentials. A missing file is not an error.
    pub fn load(&self) -> Result<Option<CachedCredentials>, CoreError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::Io(e)),
        };

        let creds: CachedCredentials = serde_json::from_slice(&data)?;
        Ok(Some(creds))
    }

    /// Persist credentials with atomic-overwrite semantics and 0600
    /// permissions.
    pub fn save(&self, email: &str, credentials: &Credentials) -> Result<(), CoreError> {
        let cached = CachedCredentials {
            email: email.to_string(),
            user_session_token: credentials.user_session_token.clone(),
            refresh_token: credentials.refresh_token.clone(),
            expires_at: credentials.expires_at,
            saved_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&cached)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write to a sibling temp file, then rename over the target.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &data)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Remove the cache file. Idempotent.
    pub fn delete(&self) -> Result<(), CoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache() -> (tempfile::TempDir, CredentialsCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = CredentialsCache::new(dir.path().join("credentials.json"));
        (dir, cache)
    }

    fn credentials() -> Credentials {
        Credentials {
            user_session_token: "UST".into(),
            access_token: "AT".into(),
            refresh_token: "RT".into(),
            expires_at: Utc::now() + Duration::hours(24),
        }
    }

    #[test]
    fn load_missing_file_is_not_present() {
        let (_dir, cache) = temp_cache();
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn save_load_round_trip() {
        let (_dir, cache) = temp_cache();
        cache.save("a@b.com", &credentials()).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded.email, "a@b.com");
        assert_eq!(loaded.user_session_token, "UST");
        assert_eq!(loaded.refresh_token, "RT");
        assert!(loaded.is_valid());

        let live = loaded.to_credentials();
        assert_eq!(live.user_session_token, "UST");
        assert_eq!(live.refresh_token, "RT");
    }

    #[test]
    fn on_disk_field_is_named_access_token() {
        let (_dir, cache) = temp_cache();
        cache.save("a@b.com", &credentials()).unwrap();

        let raw = std::fs::read_to_string(cache.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["access_token"], "UST");
        assert!(json.get("user_session_token").is_none());
        assert!(json.get("saved_at").is_some());
    }

    #[test]
    fn malformed_file_is_a_decode_error() {
        let (_dir, cache) = temp_cache();
        std::fs::write(cache.path(), b"{not json").unwrap();

        match cache.load() {
            Err(CoreError::Decode(_)) => {}
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn validity_uses_five_minute_buffer() {
        let mut cached = CachedCredentials {
            email: "a@b.com".into(),
            user_session_token: "UST".into(),
            refresh_token: "RT".into(),
            expires_at: Utc::now() + Duration::minutes(4),
            saved_at: Utc::now(),
        };
        assert!(!cached.is_valid());

        cached.expires_at = Utc::now() + Duration::minutes(6);
        assert!(cached.is_valid());
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, cache) = temp_cache();
        cache.save("a@b.com", &credentials()).unwrap();

        cache.delete().unwrap();
        cache.delete().unwrap();
        assert!(cache.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, cache) = temp_cache();
        cache.save("a@b.com", &credentials()).unwrap();

        let mode = std::fs::metadata(cache.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
