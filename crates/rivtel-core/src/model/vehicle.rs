use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The complete domain state for one vehicle.
///
/// Identity fields are established once (from the vehicle list) and are
/// never cleared by partial updates. Each merge yields a fresh value;
/// nothing mutates a state a consumer already holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    // Identity
    pub vehicle_id: String,
    #[serde(default)]
    pub vin: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model: VehicleModel,

    /// Wall-clock of the last merge. Non-decreasing per vehicle.
    pub updated_at: DateTime<Utc>,

    // Battery & charging
    /// Percentage, 0-100.
    #[serde(default)]
    pub battery_level: f64,
    /// kWh. Estimated from range and level when the wire omits it.
    #[serde(default)]
    pub battery_capacity: f64,
    /// Miles remaining.
    #[serde(default)]
    pub range_estimate: f64,
    #[serde(default)]
    pub charge_state: ChargeState,
    /// Percentage, 0-100.
    #[serde(default)]
    pub charge_limit: u8,
    /// kW; absent when not charging.
    #[serde(default)]
    pub charging_rate: Option<f64>,
    /// Absolute instant charging is expected to complete.
    #[serde(default)]
    pub time_to_charge: Option<DateTime<Utc>>,

    // Location
    #[serde(default)]
    pub location: Option<Location>,

    // Climate (Fahrenheit)
    #[serde(default)]
    pub cabin_temp: Option<f64>,
    #[serde(default)]
    pub exterior_temp: Option<f64>,

    // Security & status
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_online: bool,
    /// Miles.
    #[serde(default)]
    pub odometer: f64,

    // Closures
    #[serde(default)]
    pub doors: Closures,
    #[serde(default)]
    pub windows: Closures,
    #[serde(default)]
    pub frunk: ClosureStatus,
    #[serde(default)]
    pub liftgate: ClosureStatus,
    /// Present only for pickup-style models.
    #[serde(default)]
    pub tonneau_cover: Option<ClosureStatus>,

    // Tires
    #[serde(default)]
    pub tires: TirePressures,

    // Derived
    /// 0-100 composite; only produced for online vehicles.
    #[serde(default)]
    pub ready_score: Option<f64>,
    #[serde(default)]
    pub range_status: RangeStatus,
}

impl VehicleState {
    /// An empty state carrying only the vehicle id.
    pub fn empty(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            vin: String::new(),
            name: String::new(),
            model: VehicleModel::default(),
            updated_at: Utc::now(),
            battery_level: 0.0,
            battery_capacity: 0.0,
            range_estimate: 0.0,
            charge_state: ChargeState::default(),
            charge_limit: 0,
            charging_rate: None,
            time_to_charge: None,
            location: None,
            cabin_temp: None,
            exterior_temp: None,
            is_locked: false,
            is_online: false,
            odometer: 0.0,
            doors: Closures::default(),
            windows: Closures::default(),
            frunk: ClosureStatus::default(),
            liftgate: ClosureStatus::default(),
            tonneau_cover: None,
            tires: TirePressures::default(),
            ready_score: None,
            range_status: RangeStatus::default(),
        }
    }

    /// Estimate battery capacity (kWh) from the current level and range.
    ///
    /// `(range at 100%) / efficiency(model)`; returns 0 when the inputs
    /// cannot support an estimate.
    pub fn estimate_battery_capacity(model: VehicleModel, level_pct: f64, range_miles: f64) -> f64 {
        if level_pct <= 0.0 || range_miles <= 0.0 {
            return 0.0;
        }
        let range_at_full = range_miles / (level_pct / 100.0);
        range_at_full / model.efficiency_mi_per_kwh()
    }
}

/// GPS coordinates with their observation instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub observed_at: DateTime<Utc>,
}

/// Vehicle model line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleModel {
    #[serde(rename = "R1T")]
    R1T,
    #[serde(rename = "R1S")]
    R1S,
    #[serde(rename = "other")]
    Other,
    /// Identity not yet established.
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl VehicleModel {
    pub fn from_wire(model: &str) -> Self {
        match model {
            "R1T" => Self::R1T,
            "R1S" => Self::R1S,
            "" => Self::Unknown,
            _ => Self::Other,
        }
    }

    /// Typical efficiency used for capacity estimation.
    ///
    /// Heuristics: the R1S is slightly more efficient than the R1T.
    // TODO: allow overriding these from Config once per-model tuning is
    // exposed there.
    pub fn efficiency_mi_per_kwh(self) -> f64 {
        match self {
            Self::R1S => 2.1,
            _ => 2.0,
        }
    }
}

impl std::fmt::Display for VehicleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::R1T => "R1T",
            Self::R1S => "R1S",
            Self::Other => "other",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Charging status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeState {
    #[default]
    Unknown,
    NotCharging,
    Charging,
    Complete,
    Scheduled,
    Disconnected,
}

impl std::fmt::Display for ChargeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::NotCharging => "not_charging",
            Self::Charging => "charging",
            Self::Complete => "complete",
            Self::Scheduled => "scheduled",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// State of a single closure (door, window, frunk, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureStatus {
    #[default]
    Unknown,
    Open,
    Closed,
}

impl std::fmt::Display for ClosureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A set of four closures (doors or windows).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closures {
    pub front_left: ClosureStatus,
    pub front_right: ClosureStatus,
    pub rear_left: ClosureStatus,
    pub rear_right: ClosureStatus,
}

impl Closures {
    fn as_array(self) -> [ClosureStatus; 4] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        ]
    }

    pub fn all_closed(self) -> bool {
        self.as_array()
            .iter()
            .all(|c| *c == ClosureStatus::Closed)
    }

    pub fn any_open(self) -> bool {
        self.as_array().iter().any(|c| *c == ClosureStatus::Open)
    }

    pub fn open_count(self) -> usize {
        self.as_array()
            .iter()
            .filter(|c| **c == ClosureStatus::Open)
            .count()
    }
}

/// Per-corner tire pressure status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TireStatus {
    #[default]
    Unknown,
    Ok,
    Low,
    High,
}

/// Tire readings. The source exposes status strings only; raw pressures
/// stay `0.0` with `status` authoritative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TirePressures {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,

    pub front_left_status: TireStatus,
    pub front_right_status: TireStatus,
    pub rear_left_status: TireStatus,
    pub rear_right_status: TireStatus,
}

impl TirePressures {
    fn statuses(self) -> [TireStatus; 4] {
        [
            self.front_left_status,
            self.front_right_status,
            self.rear_left_status,
            self.rear_right_status,
        ]
    }

    /// `true` iff at least one corner has reported a status.
    pub fn has_observation(self) -> bool {
        self.statuses().iter().any(|s| *s != TireStatus::Unknown)
    }

    pub fn any_low(self) -> bool {
        self.statuses().iter().any(|s| *s == TireStatus::Low)
    }
}

/// Derived range classification used for UI emphasis and alerting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeStatus {
    #[default]
    Unknown,
    Critical,
    Low,
    Normal,
}

impl RangeStatus {
    /// Pure function of remaining miles: critical < 25, low < 50,
    /// normal otherwise.
    pub fn from_miles(miles: f64) -> Self {
        if miles < 25.0 {
            Self::Critical
        } else if miles < 50.0 {
            Self::Low
        } else {
            Self::Normal
        }
    }
}

impl std::fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Critical => "critical",
            Self::Low => "low",
            Self::Normal => "normal",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_status_thresholds() {
        assert_eq!(RangeStatus::from_miles(0.0), RangeStatus::Critical);
        assert_eq!(RangeStatus::from_miles(24.9), RangeStatus::Critical);
        assert_eq!(RangeStatus::from_miles(25.0), RangeStatus::Low);
        assert_eq!(RangeStatus::from_miles(49.9), RangeStatus::Low);
        assert_eq!(RangeStatus::from_miles(50.0), RangeStatus::Normal);
        assert_eq!(RangeStatus::from_miles(320.0), RangeStatus::Normal);
    }

    #[test]
    fn capacity_estimation_uses_model_efficiency() {
        // 200 mi at 80% -> 250 mi at full. R1T: 250 / 2.0 = 125 kWh.
        let r1t = VehicleState::estimate_battery_capacity(VehicleModel::R1T, 80.0, 200.0);
        assert!((r1t - 125.0).abs() < 1e-9);

        // R1S: 250 / 2.1.
        let r1s = VehicleState::estimate_battery_capacity(VehicleModel::R1S, 80.0, 200.0);
        assert!((r1s - 250.0 / 2.1).abs() < 1e-9);

        // Degenerate inputs produce no estimate.
        assert_eq!(
            VehicleState::estimate_battery_capacity(VehicleModel::R1T, 0.0, 200.0),
            0.0
        );
        assert_eq!(
            VehicleState::estimate_battery_capacity(VehicleModel::R1T, 50.0, 0.0),
            0.0
        );
    }

    #[test]
    fn closures_fold_helpers() {
        let mut closures = Closures {
            front_left: ClosureStatus::Closed,
            front_right: ClosureStatus::Closed,
            rear_left: ClosureStatus::Closed,
            rear_right: ClosureStatus::Closed,
        };
        assert!(closures.all_closed());
        assert!(!closures.any_open());

        closures.rear_left = ClosureStatus::Open;
        assert!(!closures.all_closed());
        assert!(closures.any_open());
        assert_eq!(closures.open_count(), 1);

        closures.rear_left = ClosureStatus::Unknown;
        assert!(!closures.all_closed());
        assert!(!closures.any_open());
    }

    #[test]
    fn tire_observation_detection() {
        let mut tires = TirePressures::default();
        assert!(!tires.has_observation());

        tires.front_left_status = TireStatus::Ok;
        assert!(tires.has_observation());
        assert!(!tires.any_low());

        tires.rear_right_status = TireStatus::Low;
        assert!(tires.any_low());
    }

    #[test]
    fn model_wire_mapping() {
        assert_eq!(VehicleModel::from_wire("R1T"), VehicleModel::R1T);
        assert_eq!(VehicleModel::from_wire("R1S"), VehicleModel::R1S);
        assert_eq!(VehicleModel::from_wire("R2"), VehicleModel::Other);
        assert_eq!(VehicleModel::from_wire(""), VehicleModel::Unknown);
    }

    #[test]
    fn state_json_round_trip() {
        let mut state = VehicleState::empty("v1");
        state.vin = "VIN123".into();
        state.name = "Adventure".into();
        state.model = VehicleModel::R1S;
        state.battery_level = 72.5;
        state.range_estimate = 180.0;
        state.range_status = RangeStatus::Normal;
        state.charge_state = ChargeState::Charging;
        state.tonneau_cover = Some(ClosureStatus::Closed);

        let json = serde_json::to_string(&state).unwrap();
        let back: VehicleState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
