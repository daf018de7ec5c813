// Derived insights: the ready score and the issue list.

use super::vehicle::{ChargeState, ClosureStatus, RangeStatus, VehicleState};

impl VehicleState {
    /// Compute the 0-100 "readiness to drive" score.
    ///
    /// Weighted sum, rounded to one decimal:
    /// - 40% battery level (already 0-100)
    /// - 20% range, with 300+ miles counting as perfect
    /// - 20% closures: 100 minus 50 for any open door, 25 for any open
    ///   window, 12.5 each for open frunk/liftgate, floored at 0
    /// - 10% lock status
    /// - 10% tire observability: 100 with any tire status, 50 without
    ///
    /// Returns `None` for offline vehicles.
    pub fn ready_score(&self) -> Option<f64> {
        if !self.is_online {
            return None;
        }

        let mut score = self.battery_level * 0.4;

        let range_score = (self.range_estimate / 300.0 * 100.0).min(100.0);
        score += range_score * 0.2;

        let mut closure_score: f64 = 100.0;
        if self.doors.any_open() {
            closure_score -= 50.0;
        }
        if self.windows.any_open() {
            closure_score -= 25.0;
        }
        if self.frunk == ClosureStatus::Open {
            closure_score -= 12.5;
        }
        if self.liftgate == ClosureStatus::Open {
            closure_score -= 12.5;
        }
        score += closure_score.max(0.0) * 0.2;

        if self.is_locked {
            score += 100.0 * 0.1;
        }

        let tire_score = if self.tires.has_observation() {
            100.0
        } else {
            50.0
        };
        score += tire_score * 0.1;

        Some((score * 10.0).round() / 10.0)
    }

    /// Recalculate and store the ready score.
    pub fn update_ready_score(&mut self) {
        self.ready_score = self.ready_score();
    }

    /// `true` when battery level is below the configured charge limit.
    pub fn needs_charge(&self) -> bool {
        self.battery_level < f64::from(self.charge_limit)
    }

    pub fn is_charging(&self) -> bool {
        self.charge_state == ChargeState::Charging
    }

    /// `true` if any critical condition is present.
    pub fn has_critical_issues(&self) -> bool {
        if self.range_status == RangeStatus::Critical {
            return true;
        }
        // Locked with an open door should be impossible; treat as critical.
        self.is_locked && self.doors.any_open()
    }

    /// Hours remaining until end of charge; `None` unless charging with
    /// a known completion instant.
    pub fn estimated_charge_hours(&self) -> Option<f64> {
        if !self.is_charging() {
            return None;
        }
        let end = self.time_to_charge?;
        let hours = (end - self.updated_at).num_seconds() as f64 / 3600.0;
        Some(hours.max(0.0))
    }

    /// Current issues and warnings, deterministic in order and wording.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        match self.range_status {
            RangeStatus::Critical => issues.push("Critical: Range below 25 miles".to_string()),
            RangeStatus::Low => issues.push("Warning: Low range (< 50 miles)".to_string()),
            _ => {}
        }

        if self.needs_charge() && !self.is_charging() {
            issues.push("Battery below charge limit - connect to charger".to_string());
        }

        if self.doors.any_open() {
            issues.push("Warning: One or more doors open".to_string());
        }
        if self.windows.any_open() {
            issues.push("Warning: One or more windows open".to_string());
        }
        if self.frunk == ClosureStatus::Open {
            issues.push("Warning: Frunk open".to_string());
        }
        if self.liftgate == ClosureStatus::Open {
            issues.push("Warning: Liftgate open".to_string());
        }
        if self.tonneau_cover == Some(ClosureStatus::Open) {
            issues.push("Warning: Tonneau cover open".to_string());
        }

        if !self.is_locked && self.doors.all_closed() && self.windows.all_closed() {
            issues.push("Info: Vehicle unlocked".to_string());
        }

        if !self.is_online {
            issues.push("Warning: Vehicle offline".to_string());
        }

        issues
    }
}
