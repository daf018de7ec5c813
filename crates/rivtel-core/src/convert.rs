//! Wire decoder: gateway payloads -> domain state.
//!
//! This is the single unit-conversion boundary. Everything downstream of
//! this module treats miles, Fahrenheit, kilowatt-hours, and absolute UTC
//! instants as canonical. Decoding never fails: absent or malformed field
//! values coerce to `unknown` / zero / absent.

use chrono::{DateTime, Duration, Utc};

use rivtel_api::types::{GnssLocation, TimestampedValue, VehicleStateRecord};

use crate::model::{
    ChargeState, Closures, ClosureStatus, FieldUpdate, Location, RangeStatus, TirePressures,
    TireStatus, VehicleState,
};

// ── Unit conversions ─────────────────────────────────────────────────

/// Range arrives in kilometers.
pub fn kilometers_to_miles(km: f64) -> f64 {
    km / 1.60934
}

/// The odometer arrives in meters.
pub fn meters_to_miles(meters: f64) -> f64 {
    meters / 1609.34
}

/// Temperatures arrive in Celsius.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

// ── String mappings ──────────────────────────────────────────────────

/// Case-insensitive charge-state mapping; unrecognised -> unknown.
pub fn parse_charge_state(raw: &str) -> ChargeState {
    match raw.to_ascii_lowercase().as_str() {
        "charging" => ChargeState::Charging,
        "complete" | "fully_charged" => ChargeState::Complete,
        "scheduled" => ChargeState::Scheduled,
        "disconnected" | "not_connected" => ChargeState::Disconnected,
        "not_charging" | "stopped" => ChargeState::NotCharging,
        _ => ChargeState::Unknown,
    }
}

/// Closure-status mapping; other/absent -> unknown.
pub fn parse_closure_status(raw: &str) -> ClosureStatus {
    match raw {
        "closed" => ClosureStatus::Closed,
        "open" => ClosureStatus::Open,
        _ => ClosureStatus::Unknown,
    }
}

/// Tire-status mapping; the gateway uses both "normal" and "OK".
pub fn parse_tire_status(raw: &str) -> TireStatus {
    match raw {
        "normal" | "OK" => TireStatus::Ok,
        "low" => TireStatus::Low,
        "high" => TireStatus::High,
        _ => TireStatus::Unknown,
    }
}

// ── Envelope helpers ─────────────────────────────────────────────────

fn value_of<T: Copy>(field: &Option<TimestampedValue<T>>) -> Option<T> {
    field.as_ref().map(|v| v.value)
}

fn closure_of(field: &Option<TimestampedValue<String>>) -> ClosureStatus {
    field
        .as_ref()
        .map(|v| parse_closure_status(&v.value))
        .unwrap_or(ClosureStatus::Unknown)
}

fn tire_of(field: &Option<TimestampedValue<String>>) -> TireStatus {
    field
        .as_ref()
        .map(|v| parse_tire_status(&v.value))
        .unwrap_or(TireStatus::Unknown)
}

fn location_of(loc: &GnssLocation, fallback: DateTime<Utc>) -> Location {
    let observed_at = loc
        .time_stamp
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback);
    Location {
        latitude: loc.latitude,
        longitude: loc.longitude,
        observed_at,
    }
}

// ── Full snapshot decode ─────────────────────────────────────────────

/// Decode a raw `GetVehicleState` record into domain state.
///
/// Identity fields other than the id stay empty here; the reducer rescues
/// them from the prior state (the state query does not carry them).
pub fn decode_state(vehicle_id: &str, record: &VehicleStateRecord) -> VehicleState {
    let now = Utc::now();
    let mut state = VehicleState::empty(vehicle_id);
    state.updated_at = now;

    // Battery & charging
    if let Some(level) = value_of(&record.battery_level) {
        state.battery_level = level;
    }
    if let Some(km) = value_of(&record.distance_to_empty) {
        state.range_estimate = kilometers_to_miles(km);
    }
    if let Some(ref charger) = record.charger_state {
        state.charge_state = parse_charge_state(&charger.value);
    }
    if let Some(limit) = value_of(&record.battery_limit) {
        state.charge_limit = limit.clamp(0.0, 100.0) as u8;
    }
    if let Some(seconds) = value_of(&record.time_to_end_of_charge) {
        // Duration to end of charge, as seconds from now.
        if seconds > 0 {
            state.time_to_charge = Some(now + Duration::seconds(seconds));
        }
    }

    // Odometer & climate
    if let Some(meters) = value_of(&record.vehicle_mileage) {
        state.odometer = meters_to_miles(meters);
    }
    if let Some(celsius) = value_of(&record.cabin_climate_interior_temperature) {
        state.cabin_temp = Some(celsius_to_fahrenheit(celsius));
    }

    // Locked iff every door lock reports "locked"; a missing or unknown
    // reading counts as unlocked.
    state.is_locked = [
        &record.door_front_left_locked,
        &record.door_front_right_locked,
        &record.door_rear_left_locked,
        &record.door_rear_right_locked,
    ]
    .iter()
    .all(|lock| lock.as_ref().is_some_and(|v| v.value == "locked"));

    // A snapshot implies the vehicle reported recently.
    state.is_online = true;

    state.doors = Closures {
        front_left: closure_of(&record.door_front_left_closed),
        front_right: closure_of(&record.door_front_right_closed),
        rear_left: closure_of(&record.door_rear_left_closed),
        rear_right: closure_of(&record.door_rear_right_closed),
    };
    state.windows = Closures {
        front_left: closure_of(&record.window_front_left_closed),
        front_right: closure_of(&record.window_front_right_closed),
        rear_left: closure_of(&record.window_rear_left_closed),
        rear_right: closure_of(&record.window_rear_right_closed),
    };
    state.frunk = closure_of(&record.closure_frunk_closed);
    state.liftgate = closure_of(&record.closure_liftgate_closed);
    state.tonneau_cover = record
        .closure_tonneau_closed
        .as_ref()
        .map(|v| parse_closure_status(&v.value));

    state.tires = TirePressures {
        front_left_status: tire_of(&record.tire_pressure_status_front_left),
        front_right_status: tire_of(&record.tire_pressure_status_front_right),
        rear_left_status: tire_of(&record.tire_pressure_status_rear_left),
        rear_right_status: tire_of(&record.tire_pressure_status_rear_right),
        ..Default::default()
    };

    if let Some(ref loc) = record.gnss_location {
        state.location = Some(location_of(loc, now));
    }

    state.range_status = RangeStatus::from_miles(state.range_estimate);
    state
}

// ── Partial update decode ────────────────────────────────────────────

/// Decode a subscription `data` payload into typed field updates.
///
/// Only the fields the subscription emits are recognised; unknown keys
/// are ignored. Units convert here, exactly as for full snapshots.
pub fn decode_partial_update(payload: &serde_json::Value) -> Vec<FieldUpdate> {
    let Some(vehicle_state) = payload
        .get("data")
        .and_then(|d| d.get("vehicleState"))
        .and_then(|v| v.as_object())
    else {
        return Vec::new();
    };

    let envelope_f64 = |key: &str| {
        vehicle_state
            .get(key)
            .and_then(|v| v.get("value"))
            .and_then(serde_json::Value::as_f64)
    };
    let envelope_str = |key: &str| {
        vehicle_state
            .get(key)
            .and_then(|v| v.get("value"))
            .and_then(serde_json::Value::as_str)
    };
    let envelope_bool = |key: &str| {
        vehicle_state
            .get(key)
            .and_then(|v| v.get("value"))
            .and_then(serde_json::Value::as_bool)
    };

    let mut fields = Vec::new();
    if let Some(level) = envelope_f64("batteryLevel") {
        fields.push(FieldUpdate::BatteryLevel(level));
    }
    if let Some(km) = envelope_f64("rangeEstimate") {
        fields.push(FieldUpdate::RangeEstimate(kilometers_to_miles(km)));
    }
    if let Some(raw) = envelope_str("chargeState") {
        fields.push(FieldUpdate::ChargeState(parse_charge_state(raw)));
    }
    if let Some(locked) = envelope_bool("isLocked") {
        fields.push(FieldUpdate::Locked(locked));
    }
    if let Some(celsius) = envelope_f64("cabinTemp") {
        fields.push(FieldUpdate::CabinTemp(celsius_to_fahrenheit(celsius)));
    }
    fields
}
