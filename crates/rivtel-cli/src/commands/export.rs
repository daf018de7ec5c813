//! The `export` command: historical snapshots from the local store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use rivtel_core::config::parse_duration;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Ctx;

const DEFAULT_HISTORY_LIMIT: usize = 1000;

pub async fn handle(
    ctx: &Ctx,
    since: Option<String>,
    until: Option<String>,
    limit: Option<usize>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let since = since.as_deref().map(parse_instant).transpose()?;
    let until = until.as_deref().map(parse_instant).transpose()?;

    let Some(store) = ctx.open_store() else {
        return Err(CliError::NotFound {
            kind: "snapshot".into(),
            identifier: "store unavailable".into(),
        });
    };

    // Export never touches the network; resolve the vehicle against the
    // store's ids.
    let ids = store.vehicle_ids().map_err(CliError::from)?;
    let index = ctx.config.vehicle;
    let vehicle_id = ids
        .get(index)
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            kind: "snapshot".into(),
            identifier: format!("vehicle index {index}"),
        })?;

    let states = match (since, until) {
        (Some(start), Some(end)) => store.range(&vehicle_id, start, end),
        (Some(start), None) => {
            store.history(&vehicle_id, start, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        }
        (None, _) => {
            // Default window: the last year, bounded.
            let start = Utc::now() - ChronoDuration::days(365);
            store.history(&vehicle_id, start, limit.unwrap_or(100))
        }
    }
    .map_err(CliError::from)?;

    if states.is_empty() {
        if !global.quiet {
            eprintln!("No snapshots found for the requested window");
        }
        return Ok(());
    }

    output::print_output(
        &output::render_states(global.format, global.pretty, &states),
        global.quiet,
    );
    Ok(())
}

/// Accept either an RFC 3339 instant or an age (e.g. `24h` = that long
/// ago).
fn parse_instant(raw: &str) -> Result<DateTime<Utc>, CliError> {
    if let Ok(instant) = raw.parse::<DateTime<Utc>>() {
        return Ok(instant);
    }
    if let Some(age) = parse_duration(raw) {
        let age = ChronoDuration::from_std(age)
            .map_err(|_| CliError::validation("time", format!("duration out of range '{raw}'")))?;
        return Ok(Utc::now() - age);
    }
    Err(CliError::validation(
        "time",
        format!("expected RFC 3339 instant or age like 24h, got '{raw}'"),
    ))
}
