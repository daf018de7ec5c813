//! Output formatting: JSON, YAML, CSV, human text, and a compact table.

use std::io::{self, Write};

use chrono::SecondsFormat;
use tabled::{settings::Style, Table, Tabled};

use rivtel_core::{ChargeState, Closures, ClosureStatus, VehicleState};

use crate::cli::OutputFormat;

/// CSV column order is fixed; consumers script against it.
pub const CSV_HEADER: &str = "Timestamp,VehicleID,VIN,Name,Model,BatteryLevel,RangeEstimate,\
RangeStatus,ChargeState,ChargeLimit,ChargingRate,IsLocked,IsOnline,Latitude,Longitude,\
CabinTemp,ExteriorTemp,Odometer,ReadyScore";

// ── Entry points ─────────────────────────────────────────────────────

/// Render one state in the chosen format.
pub fn render_state(format: OutputFormat, pretty: bool, state: &VehicleState) -> String {
    render_states(format, pretty, std::slice::from_ref(state))
}

/// Render a list of states in the chosen format.
pub fn render_states(format: OutputFormat, pretty: bool, states: &[VehicleState]) -> String {
    match format {
        OutputFormat::Json => render_json(states, pretty),
        OutputFormat::Yaml => render_yaml(states),
        OutputFormat::Csv => render_csv(states),
        OutputFormat::Text => states
            .iter()
            .map(render_text)
            .collect::<Vec<_>>()
            .join("\n---\n\n"),
        OutputFormat::Table => render_table(states),
    }
}

/// Print rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Render any serializable value as JSON or YAML (for non-state output
/// like store stats and credential status).
pub fn render_value<T: serde::Serialize>(format: OutputFormat, pretty: bool, value: &T) -> String {
    match format {
        OutputFormat::Yaml => {
            serde_yaml::to_string(value).expect("serialization should not fail")
        }
        _ if pretty => {
            serde_json::to_string_pretty(value).expect("serialization should not fail")
        }
        _ => serde_json::to_string(value).expect("serialization should not fail"),
    }
}

// ── JSON / YAML ──────────────────────────────────────────────────────

// A single state serializes as an object, a list as an array.
fn render_json(states: &[VehicleState], pretty: bool) -> String {
    let result = match (states, pretty) {
        ([state], true) => serde_json::to_string_pretty(state),
        ([state], false) => serde_json::to_string(state),
        (all, true) => serde_json::to_string_pretty(all),
        (all, false) => serde_json::to_string(all),
    };
    result.expect("serialization should not fail")
}

fn render_yaml(states: &[VehicleState]) -> String {
    if states.len() == 1 {
        serde_yaml::to_string(&states[0]).expect("serialization should not fail")
    } else {
        serde_yaml::to_string(&states).expect("serialization should not fail")
    }
}

// ── CSV ──────────────────────────────────────────────────────────────

fn render_csv(states: &[VehicleState]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for state in states {
        let (latitude, longitude) = match state.location {
            Some(ref loc) => (
                format!("{:.4}", loc.latitude),
                format!("{:.4}", loc.longitude),
            ),
            None => (String::new(), String::new()),
        };

        let row = [
            state
                .updated_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            state.vehicle_id.clone(),
            state.vin.clone(),
            state.name.clone(),
            state.model.to_string(),
            format!("{:.1}", state.battery_level),
            format!("{:.1}", state.range_estimate),
            state.range_status.to_string(),
            state.charge_state.to_string(),
            state.charge_limit.to_string(),
            opt_float(state.charging_rate, 1),
            state.is_locked.to_string(),
            state.is_online.to_string(),
            latitude,
            longitude,
            opt_float(state.cabin_temp, 1),
            opt_float(state.exterior_temp, 1),
            format!("{:.1}", state.odometer),
            opt_float(state.ready_score, 1),
        ];

        let line: Vec<String> = row.iter().map(|field| csv_escape(field)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }

    // Trim the trailing newline; print_output adds one.
    out.pop();
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn opt_float(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_default()
}

// ── Human text ───────────────────────────────────────────────────────

fn render_text(state: &VehicleState) -> String {
    let mut out = String::new();

    out.push_str(&format!("Vehicle: {} ({})\n", state.name, state.model));
    out.push_str(&format!("VIN: {}\n", state.vin));
    out.push_str(&format!(
        "Status: {}\n",
        if state.is_online { "Online" } else { "Offline" }
    ));
    out.push_str(&format!(
        "Updated: {}\n\n",
        state.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    out.push_str(&format!(
        "Battery: {:.1}% | Range: {:.0} miles ({})\n",
        state.battery_level, state.range_estimate, state.range_status
    ));

    if state.charge_state == ChargeState::Charging {
        let rate = state
            .charging_rate
            .map(|r| format!(" @ {r:.1} kW"))
            .unwrap_or_default();
        let remaining = state
            .estimated_charge_hours()
            .map(|h| format!(" ({} remaining)", format_hours(h)))
            .unwrap_or_default();
        out.push_str(&format!("Charging: charging{rate}{remaining}\n"));
    } else {
        out.push_str(&format!(
            "Charging: {} | Limit: {}%\n",
            state.charge_state, state.charge_limit
        ));
    }
    out.push('\n');

    out.push_str(&format!(
        "Lock: {}\n",
        if state.is_locked { "Locked" } else { "Unlocked" }
    ));
    out.push_str(&format!(
        "Doors: {} | Windows: {}\n",
        format_closures(state.doors),
        format_closures(state.windows)
    ));

    let mut closure_line = Vec::new();
    if state.frunk != ClosureStatus::Unknown {
        closure_line.push(format!("Frunk: {}", state.frunk));
    }
    if state.liftgate != ClosureStatus::Unknown {
        closure_line.push(format!("Liftgate: {}", state.liftgate));
    }
    if let Some(tonneau) = state.tonneau_cover {
        if tonneau != ClosureStatus::Unknown {
            closure_line.push(format!("Tonneau: {tonneau}"));
        }
    }
    if !closure_line.is_empty() {
        out.push_str(&closure_line.join(" | "));
        out.push('\n');
    }
    out.push('\n');

    if state.cabin_temp.is_some() || state.exterior_temp.is_some() {
        let mut temps = Vec::new();
        if let Some(cabin) = state.cabin_temp {
            temps.push(format!("Cabin {cabin:.1}°F"));
        }
        if let Some(exterior) = state.exterior_temp {
            temps.push(format!("Exterior {exterior:.1}°F"));
        }
        out.push_str(&format!("Temperature: {}\n", temps.join(" | ")));
    }

    if let Some(ref loc) = state.location {
        out.push_str(&format!(
            "Location: {:.4}, {:.4}\n",
            loc.latitude, loc.longitude
        ));
    }

    out.push_str(&format!("Odometer: {:.1} miles\n", state.odometer));

    if let Some(score) = state.ready_score {
        out.push_str(&format!("\nReady Score: {score:.1}/100\n"));
    }

    let issues = state.issues();
    if !issues.is_empty() {
        out.push_str("\nIssues:\n");
        for issue in issues {
            out.push_str(&format!("  - {issue}\n"));
        }
    }

    out
}

fn format_closures(closures: Closures) -> String {
    if closures.all_closed() {
        "All closed".to_string()
    } else if closures.any_open() {
        format!("{} open", closures.open_count())
    } else {
        "Unknown".to_string()
    }
}

fn format_hours(hours: f64) -> String {
    let total_minutes = (hours * 60.0).round().max(0.0) as i64;
    let h = total_minutes / 60;
    let m = total_minutes % 60;
    if h > 0 {
        format!("{h}h {m}m")
    } else {
        format!("{m}m")
    }
}

// ── Compact table ────────────────────────────────────────────────────

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "TIMESTAMP")]
    timestamp: String,
    #[tabled(rename = "BATTERY")]
    battery: String,
    #[tabled(rename = "RANGE")]
    range: String,
    #[tabled(rename = "LOCK")]
    lock: String,
    #[tabled(rename = "CHARGING")]
    charging: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

impl From<&VehicleState> for StateRow {
    fn from(state: &VehicleState) -> Self {
        Self {
            timestamp: state.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            battery: format!("{:.1}%", state.battery_level),
            range: format!("{:.0}mi", state.range_estimate),
            lock: if state.is_locked { "locked" } else { "open" }.to_string(),
            charging: state.charge_state.to_string(),
            status: if state.is_online { "online" } else { "offline" }.to_string(),
        }
    }
}

fn render_table(states: &[VehicleState]) -> String {
    let rows: Vec<StateRow> = states.iter().map(StateRow::from).collect();
    Table::new(rows).with(Style::sharp()).to_string()
}

// ── Generic list rendering (vehicles, stats) ─────────────────────────

/// Render a list of serializable + tabled items.
pub fn render_list<T, R>(
    format: OutputFormat,
    pretty: bool,
    data: &[T],
    to_row: impl Fn(&T) -> R,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table | OutputFormat::Text | OutputFormat::Csv => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Table::new(rows).with(Style::sharp()).to_string()
        }
        OutputFormat::Json => render_value(OutputFormat::Json, pretty, &data),
        OutputFormat::Yaml => render_value(OutputFormat::Yaml, pretty, &data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rivtel_core::{Location, RangeStatus, VehicleModel};

    fn sample_state() -> VehicleState {
        let mut state = VehicleState::empty("v1");
        state.vin = "7FCTGAAA1PN000001".into();
        state.name = "Adventure".into();
        state.model = VehicleModel::R1T;
        state.updated_at = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();
        state.battery_level = 85.5;
        state.range_estimate = 200.0;
        state.range_status = RangeStatus::Normal;
        state.charge_state = ChargeState::NotCharging;
        state.charge_limit = 80;
        state.is_locked = true;
        state.is_online = true;
        state.odometer = 1234.5;
        state.location = Some(Location {
            latitude: 45.5231,
            longitude: -122.6765,
            observed_at: state.updated_at,
        });
        state.ready_score = Some(92.5);
        state
    }

    #[test]
    fn csv_has_fixed_header_and_one_row() {
        let out = render_state(OutputFormat::Csv, false, &sample_state());
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("2026-07-01T12:00:00Z,v1,7FCTGAAA1PN000001,Adventure,R1T,"));
        assert!(lines[1].contains("85.5,200.0,normal,not_charging,80,"));
        assert!(lines[1].contains("45.5231,-122.6765"));
        assert!(lines[1].ends_with(",1234.5,92.5"));
    }

    #[test]
    fn csv_escapes_embedded_commas() {
        let mut state = sample_state();
        state.name = "Adventure, the truck".into();
        let out = render_state(OutputFormat::Csv, false, &state);
        assert!(out.contains("\"Adventure, the truck\""));
    }

    #[test]
    fn json_single_state_is_an_object() {
        let out = render_state(OutputFormat::Json, false, &sample_state());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["vehicle_id"], "v1");
        assert_eq!(value["battery_level"], 85.5);
    }

    #[test]
    fn json_list_is_an_array() {
        let states = vec![sample_state(), sample_state()];
        let out = render_states(OutputFormat::Json, false, &states);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn yaml_round_trips() {
        let out = render_state(OutputFormat::Yaml, false, &sample_state());
        let back: VehicleState = serde_yaml::from_str(&out).unwrap();
        assert_eq!(back, sample_state());
    }

    #[test]
    fn text_mentions_the_essentials() {
        let out = render_state(OutputFormat::Text, false, &sample_state());
        assert!(out.contains("Vehicle: Adventure (R1T)"));
        assert!(out.contains("Battery: 85.5% | Range: 200 miles (normal)"));
        assert!(out.contains("Lock: Locked"));
        assert!(out.contains("Ready Score: 92.5/100"));
    }

    #[test]
    fn table_has_expected_columns() {
        let out = render_state(OutputFormat::Table, false, &sample_state());
        assert!(out.contains("TIMESTAMP"));
        assert!(out.contains("BATTERY"));
        assert!(out.contains("85.5%"));
        assert!(out.contains("200mi"));
        assert!(out.contains("online"));
    }

    #[test]
    fn hours_format() {
        assert_eq!(format_hours(2.5), "2h 30m");
        assert_eq!(format_hours(0.25), "15m");
        assert_eq!(format_hours(-1.0), "0m");
    }
}
