use crate::{entities::vehicle, ApiResponse, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "vin": "MR0FZ29G401234567",
    "make": "Toyota",
    "model": "Hilux Revo",
    "model_year": 2021,
    "color": "White",
    "registration_no": "3ฒค 4821"
}))]
pub struct VehicleView {
    pub vin: String,
    pub make: String,
    pub model: String,
    pub model_year: Option<i32>,
    pub color: Option<String>,
    pub registration_no: Option<String>,
}

impl From<vehicle::Model> for VehicleView {
    fn from(model: vehicle::Model) -> Self {
        Self {
            vin: model.vin,
            make: model.make,
            model: model.model_name,
            model_year: model.model_year,
            color: model.color,
            registration_no: model.registration_no,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/vehicles/{vin}",
    params(("vin" = String, Path, description = "17-character VIN")),
    responses(
        (status = 200, description = "Vehicle found", body = ApiResponse<VehicleView>),
        (status = 400, description = "Malformed VIN", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown VIN", body = crate::errors::ErrorResponse),
        (status = 503, description = "Vehicle registry not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(vin): Path<String>,
) -> ApiResult<VehicleView> {
    let found = state.vehicle_service().find_by_vin(&vin).await?;
    Ok(Json(ApiResponse::success(VehicleView::from(found))))
}
