// Event reducer
//
// Exactly one task dispatches events for a given vehicle, so `updated_at`
// is stamped monotonically here without cross-thread coordination. Each
// dispatch yields a fresh state value; later events win on overlapping
// fields.

use chrono::Utc;

use rivtel_api::VehicleSummary;

use super::vehicle::{ChargeState, RangeStatus, VehicleModel, VehicleState};

/// A typed field update from the subscription stream.
///
/// A closed sum type rather than a name -> value map: the reducer match
/// is exhaustively checkable, and a typo'd field name cannot be silently
/// dropped. Values carry domain units (miles, Fahrenheit) -- the decoder
/// converts before constructing these.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    BatteryLevel(f64),
    RangeEstimate(f64),
    ChargeState(ChargeState),
    Locked(bool),
    CabinTemp(f64),
}

/// An event that can update a vehicle's state.
#[derive(Debug, Clone)]
pub enum Event {
    /// The vehicle list arrived; establishes identity for the tracked
    /// vehicle. If the tracked id is absent the state is left unchanged
    /// -- identity is never cleared.
    VehicleListReceived {
        vehicles: Vec<VehicleSummary>,
        vehicle_id: String,
    },

    /// A freshly decoded full snapshot. Replaces state wholesale except
    /// that identity fields absent on the new state are rescued from the
    /// prior one.
    SnapshotReceived { state: Box<VehicleState> },

    /// A subset of field updates, typically from the subscription.
    PartialUpdate {
        vehicle_id: String,
        fields: Vec<FieldUpdate>,
    },
}

/// Processes events and produces successive states for one vehicle.
#[derive(Debug, Default)]
pub struct Reducer {
    current: Option<VehicleState>,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event and return the resulting state (cloned).
    ///
    /// Returns `None` only while no state exists yet and the event could
    /// not create one.
    pub fn dispatch(&mut self, event: Event) -> Option<VehicleState> {
        let next = match event {
            Event::VehicleListReceived {
                vehicles,
                vehicle_id,
            } => self.apply_identity(vehicles, &vehicle_id),
            Event::SnapshotReceived { state } => Some(self.apply_snapshot(*state)),
            Event::PartialUpdate { vehicle_id, fields } => {
                Some(self.apply_partial(&vehicle_id, fields))
            }
        };

        if let Some(state) = next {
            self.current = Some(state);
        }
        self.current.clone()
    }

    /// Current state, if any.
    pub fn state(&self) -> Option<&VehicleState> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    fn apply_identity(
        &self,
        vehicles: Vec<VehicleSummary>,
        vehicle_id: &str,
    ) -> Option<VehicleState> {
        let vehicle = vehicles.into_iter().find(|v| v.id == vehicle_id)?;

        let mut state = self
            .current
            .clone()
            .unwrap_or_else(|| VehicleState::empty(vehicle_id));
        state.vehicle_id = vehicle.id;
        state.vin = vehicle.vin;
        state.name = vehicle.name;
        state.model = VehicleModel::from_wire(&vehicle.model);
        state.updated_at = Utc::now();
        state.update_ready_score();
        Some(state)
    }

    fn apply_snapshot(&self, mut state: VehicleState) -> VehicleState {
        // Rescue identity fields the state query does not carry.
        if let Some(ref current) = self.current {
            if state.vin.is_empty() {
                state.vin = current.vin.clone();
            }
            if state.name.is_empty() {
                state.name = current.name.clone();
            }
            if state.model == VehicleModel::Unknown {
                state.model = current.model;
            }
        }

        state.range_status = RangeStatus::from_miles(state.range_estimate);
        if state.battery_capacity == 0.0 {
            state.battery_capacity = VehicleState::estimate_battery_capacity(
                state.model,
                state.battery_level,
                state.range_estimate,
            );
        }
        state.updated_at = Utc::now();
        state.update_ready_score();
        state
    }

    fn apply_partial(&self, vehicle_id: &str, fields: Vec<FieldUpdate>) -> VehicleState {
        let mut state = self
            .current
            .clone()
            .unwrap_or_else(|| VehicleState::empty(vehicle_id));

        for field in fields {
            match field {
                FieldUpdate::BatteryLevel(level) => state.battery_level = level,
                FieldUpdate::RangeEstimate(miles) => {
                    state.range_estimate = miles;
                    state.range_status = RangeStatus::from_miles(miles);
                }
                FieldUpdate::ChargeState(charge_state) => state.charge_state = charge_state,
                FieldUpdate::Locked(locked) => state.is_locked = locked,
                FieldUpdate::CabinTemp(temp) => state.cabin_temp = Some(temp),
            }
        }

        state.updated_at = Utc::now();
        state.update_ready_score();
        state
    }
}
