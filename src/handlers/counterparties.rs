use crate::{
    entities::counterparty::{self, CounterpartyKind},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, page_window, paginate, validate_input},
    services::counterparties::{CounterpartyChanges, CounterpartyInput},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CounterpartyListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub kind: Option<CounterpartyKind>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CounterpartySummary {
    pub id: Uuid,
    #[schema(example = "C-0042")]
    pub code: String,
    #[schema(example = "Siam Logistics Co., Ltd.")]
    pub name: String,
    pub kind: CounterpartyKind,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<counterparty::Model> for CounterpartySummary {
    fn from(model: counterparty::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            kind: model.kind,
            tax_id: model.tax_id,
            email: model.email,
            phone: model.phone,
            address: model.address,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "code": "C-0042",
    "name": "Siam Logistics Co., Ltd.",
    "kind": "Customer",
    "tax_id": "0105551234567",
    "email": "ap@siamlogistics.example"
}))]
pub struct CreateCounterpartyRequest {
    /// Stored upper-cased; must be unique
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub kind: CounterpartyKind,
    #[validate(length(max = 32))]
    pub tax_id: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCounterpartyRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub kind: Option<CounterpartyKind>,
    #[validate(length(max = 32))]
    pub tax_id: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/counterparties",
    params(CounterpartyListQuery),
    responses(
        (status = 200, description = "Counterparties listed", body = ApiResponse<PaginatedResponse<CounterpartySummary>>)
    ),
    tag = "counterparties"
)]
pub async fn list_counterparties(
    State(state): State<AppState>,
    Query(query): Query<CounterpartyListQuery>,
) -> ApiResult<PaginatedResponse<CounterpartySummary>> {
    let (page, limit) = page_window(query.page, query.limit, &state.config);
    let (records, total) = state
        .counterparty_service()
        .list(query.kind, page, limit)
        .await?;
    let items = records.into_iter().map(CounterpartySummary::from).collect();
    Ok(Json(ApiResponse::success(paginate(items, total, page, limit))))
}

#[utoipa::path(
    post,
    path = "/api/v1/counterparties",
    request_body = CreateCounterpartyRequest,
    responses(
        (status = 201, description = "Counterparty created", body = ApiResponse<CounterpartySummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "counterparties"
)]
pub async fn create_counterparty(
    State(state): State<AppState>,
    Json(payload): Json<CreateCounterpartyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CounterpartySummary>>), ServiceError> {
    validate_input(&payload)?;

    let created = state
        .counterparty_service()
        .create(CounterpartyInput {
            code: payload.code,
            name: payload.name,
            kind: payload.kind,
            tax_id: payload.tax_id,
            email: payload.email,
            phone: payload.phone,
            address: payload.address,
        })
        .await?;
    Ok(created_response(CounterpartySummary::from(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/counterparties/{id}",
    params(("id" = Uuid, Path, description = "Counterparty ID")),
    responses(
        (status = 200, description = "Counterparty fetched", body = ApiResponse<CounterpartySummary>),
        (status = 404, description = "Counterparty not found", body = crate::errors::ErrorResponse)
    ),
    tag = "counterparties"
)]
pub async fn get_counterparty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CounterpartySummary> {
    let found = state.counterparty_service().get(id).await?;
    Ok(Json(ApiResponse::success(CounterpartySummary::from(found))))
}

#[utoipa::path(
    put,
    path = "/api/v1/counterparties/{id}",
    request_body = UpdateCounterpartyRequest,
    params(("id" = Uuid, Path, description = "Counterparty ID")),
    responses(
        (status = 200, description = "Counterparty updated", body = ApiResponse<CounterpartySummary>),
        (status = 404, description = "Counterparty not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Kind no longer fits existing documents", body = crate::errors::ErrorResponse)
    ),
    tag = "counterparties"
)]
pub async fn update_counterparty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCounterpartyRequest>,
) -> ApiResult<CounterpartySummary> {
    validate_input(&payload)?;

    let updated = state
        .counterparty_service()
        .update(
            id,
            CounterpartyChanges {
                name: payload.name,
                kind: payload.kind,
                tax_id: payload.tax_id,
                email: payload.email,
                phone: payload.phone,
                address: payload.address,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(CounterpartySummary::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/counterparties/{id}",
    params(("id" = Uuid, Path, description = "Counterparty ID")),
    responses(
        (status = 204, description = "Counterparty deleted"),
        (status = 404, description = "Counterparty not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Still referenced by documents", body = crate::errors::ErrorResponse)
    ),
    tag = "counterparties"
)]
pub async fn delete_counterparty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.counterparty_service().delete(id).await?;
    Ok(no_content_response())
}
