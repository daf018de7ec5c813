use thiserror::Error;

/// Unified error type for the core crate.
///
/// Wire-level failures pass through as [`CoreError::Api`]; the CLI maps
/// everything here onto its exit-code taxonomy.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Api(#[from] rivtel_api::Error),

    /// Snapshot store failure. The live pipeline logs and swallows
    /// these; they only surface on explicit store operations.
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON (credentials file, persisted state).
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{kind} '{identifier}' not found")]
    NotFound { kind: String, identifier: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub fn not_found(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            identifier: identifier.into(),
        }
    }

    /// `true` if re-authentication might resolve this error.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_auth())
    }

    /// `true` for transport-level failures (network unreachable).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_transport())
    }
}
