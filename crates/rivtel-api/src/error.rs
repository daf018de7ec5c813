use thiserror::Error;

/// Top-level error type for the `rivtel-api` crate.
///
/// Covers every failure mode across both transports: authentication,
/// HTTP transport, GraphQL protocol, WebSocket, and payload decoding.
/// `rivtel-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login, one-time-code, or refresh rejected by the gateway.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// No credentials, or credentials past their expiry buffer.
    #[error("Not authenticated -- login required")]
    NotAuthenticated,

    /// A one-time-code exchange was attempted without a pending MFA
    /// session (no stored otp token / email).
    #[error("No one-time-code session active -- authenticate first")]
    NoPendingOneTimeCode,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP-level failure (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-200 status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── GraphQL protocol ────────────────────────────────────────────
    /// HTTP 200 but the `errors` array was non-empty, or a polymorphic
    /// result lacked its expected fields. Carries the first GraphQL
    /// error message verbatim to aid schema-drift diagnosis.
    #[error("GraphQL error: {message}")]
    Protocol { message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket dial or handshake failed. The gateway rejects
    /// handshakes often ("bad handshake"); the caller decides whether
    /// to degrade to polling -- this crate never retries the handshake.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The WebSocket is closed (explicitly, or after the reconnect
    /// budget was exhausted).
    #[error("WebSocket closed")]
    WebSocketClosed,

    /// A subscription id was registered twice.
    #[error("Duplicate subscription id: {id}")]
    DuplicateSubscription { id: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transport-level failure the
    /// coordinator may recover from (polling fallback, retry later).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Status { .. }
                | Self::WebSocketConnect(_)
                | Self::WebSocketClosed
        )
    }

    /// Returns `true` if re-authentication might resolve this error.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::NotAuthenticated)
    }
}
