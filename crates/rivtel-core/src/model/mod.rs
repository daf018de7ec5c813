//! Consumer-facing vehicle domain model.
//!
//! [`VehicleState`] is the single source of truth handed to every
//! consumer. It is produced exclusively by the [`Reducer`] and carries
//! canonical units: miles, Fahrenheit, kilowatt-hours, absolute UTC
//! instants.

mod insights;
mod reducer;
mod vehicle;

pub use reducer::{Event, FieldUpdate, Reducer};
pub use vehicle::{
    ChargeState, Closures, ClosureStatus, Location, RangeStatus, TirePressures, TireStatus,
    VehicleModel, VehicleState,
};
