//! Wire-level types for the gateway's GraphQL schema.
//!
//! Every sensor reading arrives wrapped in a timestamped envelope
//! `{__typename, timeStamp, value}`; GPS is a flat object; all field
//! presences are optional. Values carry the gateway's native units
//! (kilometers, meters, Celsius, seconds) -- unit normalization is the
//! decoder's job in `rivtel-core`, not this crate's.

use serde::Deserialize;

/// The timestamped envelope wrapping every scalar sensor reading.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampedValue<T> {
    #[serde(rename = "__typename", default)]
    pub typename: Option<String>,
    /// ISO-8601 string. The gateway never sends integer timestamps.
    #[serde(default)]
    pub time_stamp: Option<String>,
    pub value: T,
}

/// GPS location -- flat, not enveloped.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GnssLocation {
    #[serde(rename = "__typename", default)]
    pub typename: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub time_stamp: Option<String>,
}

/// One vehicle from the `GetVehicles` query.
///
/// The gateway nests `model` under an inner `vehicle` object; this type
/// is the flattened result the client hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleSummary {
    pub id: String,
    pub vin: String,
    pub name: String,
    pub model: String,
}

/// Raw `GetVehicleState` result: every sensor as an optional envelope.
///
/// Distances are kilometers, the odometer is meters, temperatures are
/// Celsius, `time_to_end_of_charge` is integer seconds, tire fields
/// carry a status string rather than a pressure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStateRecord {
    #[serde(rename = "__typename", default)]
    pub typename: Option<String>,

    #[serde(default)]
    pub gnss_location: Option<GnssLocation>,

    // Battery & charging
    #[serde(default)]
    pub battery_level: Option<TimestampedValue<f64>>,
    #[serde(default)]
    pub distance_to_empty: Option<TimestampedValue<f64>>,
    #[serde(default)]
    pub charger_state: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub battery_limit: Option<TimestampedValue<f64>>,
    #[serde(default)]
    pub time_to_end_of_charge: Option<TimestampedValue<i64>>,

    // Odometer & climate
    #[serde(default)]
    pub vehicle_mileage: Option<TimestampedValue<f64>>,
    #[serde(default)]
    pub cabin_climate_interior_temperature: Option<TimestampedValue<f64>>,

    // Door locks
    #[serde(default)]
    pub door_front_left_locked: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub door_front_right_locked: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub door_rear_left_locked: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub door_rear_right_locked: Option<TimestampedValue<String>>,

    // Door closures
    #[serde(default)]
    pub door_front_left_closed: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub door_front_right_closed: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub door_rear_left_closed: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub door_rear_right_closed: Option<TimestampedValue<String>>,

    // Window closures
    #[serde(default)]
    pub window_front_left_closed: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub window_front_right_closed: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub window_rear_left_closed: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub window_rear_right_closed: Option<TimestampedValue<String>>,

    // Scalar closures
    #[serde(default)]
    pub closure_frunk_closed: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub closure_liftgate_closed: Option<TimestampedValue<String>>,
    /// Present only for pickup-style models.
    #[serde(default)]
    pub closure_tonneau_closed: Option<TimestampedValue<String>>,

    // Tire pressure status strings ("normal", "OK", "low", "high")
    #[serde(default)]
    pub tire_pressure_status_front_left: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub tire_pressure_status_front_right: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub tire_pressure_status_rear_left: Option<TimestampedValue<String>>,
    #[serde(default)]
    pub tire_pressure_status_rear_right: Option<TimestampedValue<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_timestamped_envelope() {
        let json = r#"{
            "__typename": "TimeStampedFloat",
            "timeStamp": "2026-07-01T12:00:00Z",
            "value": 85.5
        }"#;

        let v: TimestampedValue<f64> = serde_json::from_str(json).unwrap();
        assert_eq!(v.value, 85.5);
        assert_eq!(v.time_stamp.as_deref(), Some("2026-07-01T12:00:00Z"));
    }

    #[test]
    fn deserialize_state_record_with_partial_fields() {
        let json = r#"{
            "__typename": "VehicleState",
            "batteryLevel": { "timeStamp": "2026-07-01T12:00:00Z", "value": 42.0 },
            "chargerState": { "timeStamp": "2026-07-01T12:00:00Z", "value": "charging" },
            "gnssLocation": { "latitude": 45.5, "longitude": -122.6, "timeStamp": "2026-07-01T12:00:00Z" }
        }"#;

        let record: VehicleStateRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.battery_level.as_ref().unwrap().value, 42.0);
        assert_eq!(record.charger_state.as_ref().unwrap().value, "charging");
        assert!(record.distance_to_empty.is_none());
        let loc = record.gnss_location.unwrap();
        assert_eq!(loc.latitude, 45.5);
        assert_eq!(loc.longitude, -122.6);
    }
}
