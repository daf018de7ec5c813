// Vehicle queries
//
// `GetVehicles` and `GetVehicleState` as inherent methods on the client.
// Note the schema quirks: `GetVehicles` nests `model` under an inner
// `vehicle` object, and `GetVehicleState` takes a CAPITAL-ID variable.

use serde::Deserialize;
use serde_json::json;

use crate::client::RivianClient;
use crate::error::Error;
use crate::types::{VehicleStateRecord, VehicleSummary};

const GET_VEHICLES_QUERY: &str = r#"
    query GetVehicles {
        currentUser {
            __typename
            vehicles {
                __typename
                id
                vin
                name
                vehicle {
                    __typename
                    model
                }
            }
        }
    }
"#;

const GET_VEHICLE_STATE_QUERY: &str = r#"
    query GetVehicleState($vehicleID: String!) {
        vehicleState(id: $vehicleID) {
            __typename
            gnssLocation { __typename latitude longitude timeStamp }
            batteryLevel { __typename timeStamp value }
            distanceToEmpty { __typename timeStamp value }
            chargerState { __typename timeStamp value }
            batteryLimit { __typename timeStamp value }
            timeToEndOfCharge { __typename timeStamp value }
            vehicleMileage { __typename timeStamp value }
            cabinClimateInteriorTemperature { __typename timeStamp value }
            doorFrontLeftLocked { __typename timeStamp value }
            doorFrontLeftClosed { __typename timeStamp value }
            doorFrontRightLocked { __typename timeStamp value }
            doorFrontRightClosed { __typename timeStamp value }
            doorRearLeftLocked { __typename timeStamp value }
            doorRearLeftClosed { __typename timeStamp value }
            doorRearRightLocked { __typename timeStamp value }
            doorRearRightClosed { __typename timeStamp value }
            windowFrontLeftClosed { __typename timeStamp value }
            windowFrontRightClosed { __typename timeStamp value }
            windowRearLeftClosed { __typename timeStamp value }
            windowRearRightClosed { __typename timeStamp value }
            closureFrunkClosed { __typename timeStamp value }
            closureLiftgateClosed { __typename timeStamp value }
            closureTonneauClosed { __typename timeStamp value }
            tirePressureStatusFrontLeft { __typename timeStamp value }
            tirePressureStatusFrontRight { __typename timeStamp value }
            tirePressureStatusRearLeft { __typename timeStamp value }
            tirePressureStatusRearRight { __typename timeStamp value }
        }
    }
"#;

// ── Response shapes ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VehiclesData {
    #[serde(rename = "currentUser")]
    current_user: CurrentUser,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    #[serde(default)]
    vehicles: Vec<RawVehicle>,
}

#[derive(Debug, Deserialize)]
struct RawVehicle {
    id: String,
    #[serde(default)]
    vin: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    vehicle: Option<RawVehicleInner>,
}

#[derive(Debug, Deserialize)]
struct RawVehicleInner {
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct VehicleStateData {
    #[serde(rename = "vehicleState")]
    vehicle_state: VehicleStateRecord,
}

// ── Queries ──────────────────────────────────────────────────────────

impl RivianClient {
    /// List the authenticated account's vehicles.
    pub async fn list_vehicles(&self) -> Result<Vec<VehicleSummary>, Error> {
        if !self.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }

        let data: VehiclesData = self.execute(GET_VEHICLES_QUERY, None).await?;

        Ok(data
            .current_user
            .vehicles
            .into_iter()
            .map(|v| VehicleSummary {
                id: v.id,
                vin: v.vin,
                name: v.name,
                model: v.vehicle.map(|inner| inner.model).unwrap_or_default(),
            })
            .collect())
    }

    /// Fetch the raw state snapshot for a vehicle.
    ///
    /// The record carries the gateway's native units; decoding and unit
    /// normalization happen downstream.
    pub async fn vehicle_state(&self, vehicle_id: &str) -> Result<VehicleStateRecord, Error> {
        if !self.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }

        let variables = json!({ "vehicleID": vehicle_id });
        let data: VehicleStateData = self
            .execute(GET_VEHICLE_STATE_QUERY, Some(variables))
            .await?;

        Ok(data.vehicle_state)
    }
}
