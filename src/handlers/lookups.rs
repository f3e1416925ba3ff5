use crate::{
    entities::document::{DocumentKind, DocumentStatus},
    errors::ServiceError,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{NaiveDate, Utc};
use sea_orm::Iterable;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentKindInfo {
    pub kind: DocumentKind,
    #[schema(example = "BN")]
    pub prefix: &'static str,
    pub default_status: DocumentStatus,
    pub statuses: Vec<DocumentStatus>,
    /// Role the counterparty must be able to take
    #[schema(example = "Customer")]
    pub counterparty_role: String,
}

impl From<DocumentKind> for DocumentKindInfo {
    fn from(kind: DocumentKind) -> Self {
        Self {
            kind,
            prefix: kind.prefix(),
            default_status: kind.default_status(),
            statuses: kind.allowed_statuses().to_vec(),
            counterparty_role: kind.counterparty_role().to_string(),
        }
    }
}

pub fn document_kind_table() -> Vec<DocumentKindInfo> {
    DocumentKind::iter().map(DocumentKindInfo::from).collect()
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NextNumberQuery {
    pub kind: DocumentKind,
    /// Defaults to today
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NextNumberResponse {
    pub kind: DocumentKind,
    pub date: NaiveDate,
    #[schema(example = "BN-202403-0002")]
    pub number: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/lookups/document-kinds",
    responses((status = 200, description = "Kinds with prefixes and statuses", body = ApiResponse<Vec<DocumentKindInfo>>)),
    tag = "lookups"
)]
pub async fn document_kinds() -> ApiResult<Vec<DocumentKindInfo>> {
    Ok(Json(ApiResponse::success(document_kind_table())))
}

/// Preview only; the number is not reserved.
#[utoipa::path(
    get,
    path = "/api/v1/lookups/next-number",
    params(NextNumberQuery),
    responses(
        (status = 200, description = "Number the next document would receive", body = ApiResponse<NextNumberResponse>),
        (status = 409, description = "Sequence exhausted for the month", body = crate::errors::ErrorResponse)
    ),
    tag = "lookups"
)]
pub async fn next_number(
    State(state): State<AppState>,
    Query(query): Query<NextNumberQuery>,
) -> Result<Json<ApiResponse<NextNumberResponse>>, ServiceError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let number = state.numbering_service().preview(query.kind, date).await?;
    Ok(Json(ApiResponse::success(NextNumberResponse {
        kind: query.kind,
        date,
        number,
    })))
}
