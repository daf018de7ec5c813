// rivtel-core: domain layer between rivtel-api and consumers (CLI, exporters).

pub mod config;
pub mod convert;
pub mod credentials;
pub mod error;
pub mod model;
pub mod monitor;
pub mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::Config;
pub use credentials::{CachedCredentials, CredentialsCache};
pub use error::CoreError;
pub use monitor::{Monitor, MonitorConfig};
pub use session::{SessionManager, SessionStatus};
pub use store::{SnapshotStore, StoreStats};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ChargeState, Closures, ClosureStatus, Event, FieldUpdate, Location, RangeStatus, Reducer,
    TirePressures, TireStatus, VehicleModel, VehicleState,
};
