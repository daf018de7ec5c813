//! Async Rust client for the (unofficial, undocumented) Rivian vehicle-data
//! gateway.
//!
//! The gateway exposes a single GraphQL endpoint over two transports:
//!
//! - **HTTPS** ([`RivianClient`]) — queries and mutations: the CSRF /
//!   password / one-time-code authentication exchange, token refresh,
//!   vehicle listing, and full vehicle-state snapshots.
//! - **GraphQL-over-WebSocket** ([`WsClient`]) — live `VehicleStateUpdates`
//!   subscriptions using the legacy `graphql-ws` subprotocol (NOT the newer
//!   `graphql-transport-ws`).
//!
//! Both transports share one session: the CSRF token, app-session token,
//! and user-session token obtained during authentication are injected as
//! the `csrf-token` / `a-sess` / `u-sess` headers on every request and on
//! the WebSocket upgrade. [`SessionHeaders`] is the read-only snapshot that
//! crosses from the HTTPS client to the WebSocket dialer.
//!
//! Higher-level consumers (`rivtel-core`) drive the authentication state
//! machine, decode wire payloads into domain state, and arbitrate between
//! the two transports.

pub mod auth;
pub mod client;
pub mod error;
pub mod transport;
pub mod types;
pub mod vehicles;
pub mod websocket;

pub use auth::{Credentials, LoginOutcome};
pub use client::{RivianClient, SessionHeaders, VehicleApi};
pub use error::Error;
pub use transport::TransportConfig;
pub use types::{GnssLocation, TimestampedValue, VehicleStateRecord, VehicleSummary};
pub use websocket::{SubscriptionUpdate, VehicleStateSubscription, WsClient, WsConfig};

/// Base URL for the production gateway.
pub const BASE_URL: &str = "https://rivian.com";

/// GraphQL endpoint path, shared by both transports.
pub const GRAPHQL_PATH: &str = "/api/gql/gateway/graphql";

/// WebSocket endpoint for live subscriptions.
pub const WEBSOCKET_URL: &str = "wss://rivian.com/api/gql/gateway/graphql";

/// Apollo client identifier sent on every request.
///
/// Must be the Android-variant value: the iOS string is rejected by this
/// backend with "Entity not found".
pub const APOLLO_CLIENT_NAME: &str = "com.rivian.android.consumer";

/// User-Agent for both transports.
pub const USER_AGENT: &str = concat!("rivtel/", env!("CARGO_PKG_VERSION"));
