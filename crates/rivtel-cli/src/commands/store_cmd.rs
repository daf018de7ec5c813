//! Snapshot-store maintenance: stats and pruning.

use chrono::{Duration as ChronoDuration, Utc};
use tabled::Tabled;

use rivtel_core::config::parse_duration;
use rivtel_core::StoreStats;

use crate::cli::{GlobalOpts, OutputFormat, StoreArgs, StoreCommand};
use crate::error::CliError;
use crate::output;

use super::Ctx;

#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "SNAPSHOTS")]
    snapshots: i64,
    #[tabled(rename = "VEHICLES")]
    vehicles: i64,
    #[tabled(rename = "OLDEST")]
    oldest: String,
    #[tabled(rename = "NEWEST")]
    newest: String,
    #[tabled(rename = "SIZE")]
    size: String,
}

impl From<&StoreStats> for StatsRow {
    fn from(stats: &StoreStats) -> Self {
        let fmt = |t: Option<chrono::DateTime<Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        Self {
            snapshots: stats.total_states,
            vehicles: stats.unique_vehicles,
            oldest: fmt(stats.oldest_state),
            newest: fmt(stats.newest_state),
            size: format_size(stats.database_size),
        }
    }
}

pub async fn handle(ctx: &Ctx, args: StoreArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let Some(store) = ctx.open_store() else {
        return Err(CliError::NotFound {
            kind: "snapshot".into(),
            identifier: "store unavailable".into(),
        });
    };

    match args.command {
        StoreCommand::Stats => {
            let stats = store.stats().map_err(CliError::from)?;
            let out = match global.format {
                OutputFormat::Json | OutputFormat::Yaml => {
                    output::render_value(global.format, global.pretty, &stats)
                }
                _ => output::render_list(global.format, global.pretty, &[stats], |s| StatsRow::from(s)),
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        StoreCommand::Prune { older_than, yes } => {
            let age = parse_duration(&older_than).ok_or_else(|| {
                CliError::validation("older-than", format!("unparseable '{older_than}'"))
            })?;
            let age = ChronoDuration::from_std(age).map_err(|_| {
                CliError::validation("older-than", format!("duration out of range '{older_than}'"))
            })?;
            let cutoff = Utc::now() - age;

            if !yes {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Delete all snapshots older than {older_than}? This is permanent."
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
                if !confirmed {
                    return Ok(());
                }
            }

            let deleted = store.delete_older_than(cutoff).map_err(CliError::from)?;
            if !global.quiet {
                eprintln!("Deleted {deleted} snapshot(s)");
            }
            Ok(())
        }
    }
}

fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
