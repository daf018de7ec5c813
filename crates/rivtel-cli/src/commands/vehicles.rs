//! Vehicle listing.

use serde::Serialize;
use tabled::Tabled;

use rivtel_api::VehicleSummary;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Ctx;

#[derive(Tabled)]
struct VehicleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "MODEL")]
    model: String,
    #[tabled(rename = "VIN")]
    vin: String,
    #[tabled(rename = "ID")]
    id: String,
}

#[derive(Serialize)]
struct VehicleEntry<'a> {
    index: usize,
    id: &'a str,
    vin: &'a str,
    name: &'a str,
    model: &'a str,
}

pub async fn handle(ctx: &Ctx, global: &GlobalOpts) -> Result<(), CliError> {
    ctx.require_auth().await?;
    let vehicles: Vec<VehicleSummary> = ctx.client.list_vehicles().await?;

    let entries: Vec<VehicleEntry<'_>> = vehicles
        .iter()
        .enumerate()
        .map(|(index, v)| VehicleEntry {
            index,
            id: &v.id,
            vin: &v.vin,
            name: &v.name,
            model: &v.model,
        })
        .collect();

    let out = output::render_list(global.format, global.pretty, &entries, |e| VehicleRow {
        index: e.index,
        name: e.name.to_string(),
        model: e.model.to_string(),
        vin: e.vin.to_string(),
        id: e.id.to_string(),
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
