//! The `status` command: one state snapshot, live or from the store.

use tracing::warn;

use rivtel_core::convert;
use rivtel_core::{Event, Reducer};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Ctx;

pub async fn handle(ctx: &Ctx, offline: bool, global: &GlobalOpts) -> Result<(), CliError> {
    let state = if offline {
        offline_state(ctx)?
    } else {
        live_state(ctx).await?
    };

    output::print_output(
        &output::render_state(global.format, global.pretty, &state),
        global.quiet,
    );
    Ok(())
}

/// Newest persisted row for the configured vehicle index. The network is
/// not consulted, so vehicles resolve against the store's own ids.
fn offline_state(ctx: &Ctx) -> Result<rivtel_core::VehicleState, CliError> {
    let Some(store) = ctx.open_store() else {
        return Err(CliError::NotFound {
            kind: "snapshot".into(),
            identifier: "store unavailable".into(),
        });
    };

    let ids = store.vehicle_ids().map_err(CliError::from)?;
    let index = ctx.config.vehicle;
    let vehicle_id = ids
        .get(index)
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            kind: "snapshot".into(),
            identifier: format!("vehicle index {index}"),
        })?;

    store
        .latest(&vehicle_id)
        .map_err(CliError::from)?
        .ok_or(CliError::NotFound {
            kind: "snapshot".into(),
            identifier: vehicle_id,
        })
}

/// Fetch, decode, and merge a fresh snapshot; persist it best-effort.
async fn live_state(ctx: &Ctx) -> Result<rivtel_core::VehicleState, CliError> {
    ctx.require_auth().await?;
    let vehicle = ctx.resolve_vehicle().await?;
    let vehicle_id = vehicle.id.clone();

    let record = ctx.client.vehicle_state(&vehicle_id).await?;

    let mut reducer = Reducer::new();
    reducer.dispatch(Event::VehicleListReceived {
        vehicles: vec![vehicle],
        vehicle_id: vehicle_id.clone(),
    });
    let state = reducer
        .dispatch(Event::SnapshotReceived {
            state: Box::new(convert::decode_state(&vehicle_id, &record)),
        })
        .expect("snapshot dispatch always yields a state");

    if let Some(store) = ctx.open_store() {
        if let Err(e) = store.save(&state) {
            warn!(error = %e, "failed to persist snapshot");
        }
    }

    Ok(state)
}
