//! CLI error types with miette diagnostics and exit-code mapping.

use miette::Diagnostic;
use thiserror::Error;

use rivtel_core::CoreError;

/// Stable exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// Authentication failures, and the terminal fallback for anything
    /// without a more specific code.
    pub const AUTH: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const TRANSPORT: i32 = 3;
    pub const USAGE: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(rivtel::auth_failed),
        help("Check your email and password, then run: rivtel auth login")
    )]
    Auth { message: String },

    #[error("Not logged in")]
    #[diagnostic(
        code(rivtel::not_logged_in),
        help("Run: rivtel auth login\nOr set RIVTEL_EMAIL and RIVTEL_PASSWORD.")
    )]
    NotLoggedIn,

    #[error("One-time code rejected")]
    #[diagnostic(
        code(rivtel::otc_rejected),
        help("Request a fresh code by running: rivtel auth login")
    )]
    OneTimeCodeRejected,

    // ── Resources ────────────────────────────────────────────────────
    #[error("{kind} '{identifier}' not found")]
    #[diagnostic(code(rivtel::not_found))]
    NotFound { kind: String, identifier: String },

    #[error("Vehicle index {index} out of range ({count} vehicle(s) available)")]
    #[diagnostic(
        code(rivtel::vehicle_index),
        help("Run: rivtel vehicles to list available vehicles")
    )]
    VehicleIndexOutOfRange { index: usize, count: usize },

    // ── Transport / API ──────────────────────────────────────────────
    #[error("Gateway unreachable: {message}")]
    #[diagnostic(
        code(rivtel::transport),
        help("Check network connectivity; use --offline for cached data.")
    )]
    Transport { message: String },

    #[error("Gateway error: {message}")]
    #[diagnostic(code(rivtel::api))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(rivtel::validation))]
    Validation { field: String, reason: String },

    // ── Local state ──────────────────────────────────────────────────
    #[error("Store error: {message}")]
    #[diagnostic(code(rivtel::store))]
    Store { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Map this error to a process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Auth { .. } | Self::NotLoggedIn | Self::OneTimeCodeRejected => exit_code::AUTH,
            Self::NotFound { .. } | Self::VehicleIndexOutOfRange { .. } => exit_code::NOT_FOUND,
            Self::Transport { .. } => exit_code::TRANSPORT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::AUTH,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Api(api) => api.into(),
            CoreError::NotFound { kind, identifier } => CliError::NotFound { kind, identifier },
            CoreError::Store(e) => CliError::Store {
                message: e.to_string(),
            },
            CoreError::Io(e) => CliError::Io(e),
            CoreError::Decode(e) => CliError::Store {
                message: format!("malformed persisted data: {e}"),
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl From<rivtel_api::Error> for CliError {
    fn from(err: rivtel_api::Error) -> Self {
        use rivtel_api::Error as Api;
        match err {
            Api::Auth { message } => CliError::Auth { message },
            Api::NotAuthenticated | Api::NoPendingOneTimeCode => CliError::NotLoggedIn,
            e if e.is_transport() => CliError::Transport {
                message: e.to_string(),
            },
            e => CliError::Api {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_taxonomy() {
        assert_eq!(
            CliError::Auth {
                message: "bad password".into()
            }
            .exit_code(),
            1
        );
        assert_eq!(CliError::NotLoggedIn.exit_code(), 1);
        assert_eq!(
            CliError::VehicleIndexOutOfRange { index: 3, count: 1 }.exit_code(),
            2
        );
        assert_eq!(
            CliError::NotFound {
                kind: "vehicle".into(),
                identifier: "v9".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(
            CliError::Transport {
                message: "dial".into()
            }
            .exit_code(),
            3
        );
        assert_eq!(
            CliError::validation("since", "unparseable").exit_code(),
            4
        );
    }

    #[test]
    fn api_errors_map_by_kind() {
        let transport: CliError = rivtel_api::Error::Status {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert_eq!(transport.exit_code(), exit_code::TRANSPORT);

        let auth: CliError = rivtel_api::Error::Auth {
            message: "rejected".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let protocol: CliError = rivtel_api::Error::Protocol {
            message: "schema drift".into(),
        }
        .into();
        assert!(matches!(protocol, CliError::Api { .. }));
    }
}
