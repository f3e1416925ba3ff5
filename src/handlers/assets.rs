use crate::{
    entities::asset::{self, AssetStatus},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, page_window, paginate, validate_input},
    services::assets::{AssetChanges, AssetInput},
    services::document_writer::MONEY_SCALE,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssetListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<AssetStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetSummary {
    pub id: Uuid,
    /// `AS-<YYYYMM>-<NNNN>`
    #[schema(example = "AS-202403-0007")]
    pub asset_tag: String,
    #[schema(example = "Forklift FD25")]
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub location: Option<String>,
    pub status: AssetStatus,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<asset::Model> for AssetSummary {
    fn from(model: asset::Model) -> Self {
        Self {
            id: model.id,
            asset_tag: model.asset_tag,
            name: model.name,
            category: model.category,
            serial_number: model.serial_number,
            location: model.location,
            status: model.status,
            purchase_date: model.purchase_date,
            purchase_cost: model.purchase_cost,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Forklift FD25",
    "category": "Warehouse",
    "serial_number": "FD25-889201",
    "location": "Bangna DC",
    "purchase_date": "2023-11-02",
    "purchase_cost": "685000.00"
}))]
pub struct CreateAssetRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub serial_number: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    /// Defaults to `InService`
    pub status: Option<AssetStatus>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_cost: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateAssetRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 100))]
    pub serial_number: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub status: Option<AssetStatus>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_cost: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

fn check_cost(cost: Option<Decimal>) -> Result<(), ServiceError> {
    match cost {
        Some(cost) if cost < Decimal::ZERO => Err(ServiceError::ValidationError(
            "purchase_cost cannot be negative".to_string(),
        )),
        Some(cost) if cost.normalize().scale() > MONEY_SCALE => Err(
            ServiceError::ValidationError("purchase_cost is limited to whole cents".to_string()),
        ),
        _ => Ok(()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/assets",
    params(AssetListQuery),
    responses(
        (status = 200, description = "Assets listed", body = ApiResponse<PaginatedResponse<AssetSummary>>)
    ),
    tag = "assets"
)]
pub async fn list_assets(
    State(state): State<AppState>,
    Query(query): Query<AssetListQuery>,
) -> ApiResult<PaginatedResponse<AssetSummary>> {
    let (page, limit) = page_window(query.page, query.limit, &state.config);
    let (records, total) = state.asset_service().list(query.status, page, limit).await?;
    let items = records.into_iter().map(AssetSummary::from).collect();
    Ok(Json(ApiResponse::success(paginate(items, total, page, limit))))
}

#[utoipa::path(
    post,
    path = "/api/v1/assets",
    request_body = CreateAssetRequest,
    responses(
        (status = 201, description = "Asset registered with a generated tag", body = ApiResponse<AssetSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "assets"
)]
pub async fn create_asset(
    State(state): State<AppState>,
    Json(payload): Json<CreateAssetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AssetSummary>>), ServiceError> {
    validate_input(&payload)?;
    check_cost(payload.purchase_cost)?;

    let created = state
        .asset_service()
        .create(AssetInput {
            name: payload.name,
            category: payload.category,
            serial_number: payload.serial_number,
            location: payload.location,
            status: payload.status,
            purchase_date: payload.purchase_date,
            purchase_cost: payload.purchase_cost,
            notes: payload.notes,
        })
        .await?;
    Ok(created_response(AssetSummary::from(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset fetched", body = ApiResponse<AssetSummary>),
        (status = 404, description = "Asset not found", body = crate::errors::ErrorResponse)
    ),
    tag = "assets"
)]
pub async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<AssetSummary> {
    let found = state.asset_service().get(id).await?;
    Ok(Json(ApiResponse::success(AssetSummary::from(found))))
}

#[utoipa::path(
    put,
    path = "/api/v1/assets/{id}",
    request_body = UpdateAssetRequest,
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset updated", body = ApiResponse<AssetSummary>),
        (status = 404, description = "Asset not found", body = crate::errors::ErrorResponse)
    ),
    tag = "assets"
)]
pub async fn update_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAssetRequest>,
) -> ApiResult<AssetSummary> {
    validate_input(&payload)?;
    check_cost(payload.purchase_cost)?;

    let updated = state
        .asset_service()
        .update(
            id,
            AssetChanges {
                name: payload.name,
                category: payload.category,
                serial_number: payload.serial_number,
                location: payload.location,
                status: payload.status,
                purchase_date: payload.purchase_date,
                purchase_cost: payload.purchase_cost,
                notes: payload.notes,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(AssetSummary::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/assets/{id}",
    params(("id" = Uuid, Path, description = "Asset ID")),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 404, description = "Asset not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Still referenced by documents", body = crate::errors::ErrorResponse)
    ),
    tag = "assets"
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.asset_service().delete(id).await?;
    Ok(no_content_response())
}
