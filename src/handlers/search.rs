//! Typeahead endpoints. Each returns at most 25 compact hits.

use crate::{
    entities::{
        asset::{self, AssetStatus},
        counterparty::{self, CounterpartyKind},
        document::{self, DocumentKind, DocumentStatus},
    },
    handlers::common::{search_limit, SearchQuery},
    ApiResponse, ApiResult, AppState,
};
use axum::extract::{Query, State};
use axum::response::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CounterpartySearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u64>,
    /// Restrict to parties that can act in this role
    pub role: Option<CounterpartyKind>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentSearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u64>,
    pub kind: Option<DocumentKind>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CounterpartyHit {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: CounterpartyKind,
}

impl From<counterparty::Model> for CounterpartyHit {
    fn from(model: counterparty::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            kind: model.kind,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetHit {
    pub id: Uuid,
    pub asset_tag: String,
    pub name: String,
    pub serial_number: Option<String>,
    pub status: AssetStatus,
}

impl From<asset::Model> for AssetHit {
    fn from(model: asset::Model) -> Self {
        Self {
            id: model.id,
            asset_tag: model.asset_tag,
            name: model.name,
            serial_number: model.serial_number,
            status: model.status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentHit {
    pub id: Uuid,
    pub kind: DocumentKind,
    pub number: String,
    pub document_date: NaiveDate,
    pub status: DocumentStatus,
    pub total_amount: Decimal,
}

impl From<document::Model> for DocumentHit {
    fn from(model: document::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            number: model.number,
            document_date: model.document_date,
            status: model.status,
            total_amount: model.total_amount,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/search/counterparties",
    params(CounterpartySearchQuery),
    responses((status = 200, description = "Matching counterparties", body = ApiResponse<Vec<CounterpartyHit>>)),
    tag = "search"
)]
pub async fn search_counterparties(
    State(state): State<AppState>,
    Query(query): Query<CounterpartySearchQuery>,
) -> ApiResult<Vec<CounterpartyHit>> {
    let rows = state
        .counterparty_service()
        .search(&query.q, query.role, search_limit(query.limit))
        .await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(CounterpartyHit::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/search/assets",
    params(SearchQuery),
    responses((status = 200, description = "Matching assets", body = ApiResponse<Vec<AssetHit>>)),
    tag = "search"
)]
pub async fn search_assets(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<AssetHit>> {
    let rows = state
        .asset_service()
        .search(&query.q, query.limit())
        .await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(AssetHit::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/search/documents",
    params(DocumentSearchQuery),
    responses((status = 200, description = "Matching documents", body = ApiResponse<Vec<DocumentHit>>)),
    tag = "search"
)]
pub async fn search_documents(
    State(state): State<AppState>,
    Query(query): Query<DocumentSearchQuery>,
) -> ApiResult<Vec<DocumentHit>> {
    let rows = state
        .document_service()
        .search(&query.q, query.kind, search_limit(query.limit))
        .await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(DocumentHit::from).collect(),
    )))
}
