//! The `watch` command: stream live state updates until interrupted.

use std::sync::Arc;

use rivtel_api::VehicleApi;
use rivtel_core::config::parse_duration;
use rivtel_core::{Monitor, MonitorConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Ctx;

pub async fn handle(
    ctx: &Ctx,
    interval: Option<String>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let poll_interval = match interval.as_deref().or(ctx.config.poll_interval.as_deref()) {
        Some(raw) => Some(
            parse_duration(raw)
                .ok_or_else(|| CliError::validation("interval", format!("unparseable '{raw}'")))?,
        ),
        None => None,
    };

    ctx.require_auth().await?;
    let vehicle = ctx.resolve_vehicle().await?;

    let monitor = Monitor::new(
        ctx.client.clone() as Arc<dyn VehicleApi>,
        ctx.open_store(),
        MonitorConfig { poll_interval },
    );

    let mut updates = monitor.watch(vehicle).await;

    if !global.quiet {
        eprintln!("Watching for updates... (press Ctrl+C to stop)");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !global.quiet {
                    eprintln!("Shutting down...");
                }
                break;
            }
            state = updates.recv() => {
                let Some(state) = state else { break };
                output::print_output(
                    &output::render_state(global.format, global.pretty, &state),
                    global.quiet,
                );
            }
        }
    }

    monitor.shutdown().await;
    Ok(())
}
