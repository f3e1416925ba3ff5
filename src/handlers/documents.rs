use crate::{
    auth::AuthUser,
    commands::documents::{
        CreateDocumentCommand, DeleteDocumentCommand, LineItemInput, ReplaceDocumentItemsCommand,
        UpdateDocumentStatusCommand,
    },
    entities::{
        document::{self, DocumentKind, DocumentStatus},
        document_item,
    },
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, page_window, paginate},
    services::{document_writer::DocumentWithItems, documents::DocumentFilter},
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

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub kind: Option<DocumentKind>,
    pub status: Option<DocumentStatus>,
    pub counterparty_id: Option<Uuid>,
    /// Earliest document date, inclusive
    pub from: Option<NaiveDate>,
    /// Latest document date, inclusive
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "0b6f3c1e-8a55-4b8e-9c55-6f6c2f9b7f10",
    "kind": "BillingNote",
    "number": "BN-202403-0001",
    "document_date": "2024-03-15",
    "due_date": "2024-04-15",
    "status": "Sent",
    "counterparty_id": "5a1d2f1e-3c1b-4f52-9b75-7d1e2c3a4b5c",
    "asset_id": null,
    "reference": "INV-202403-0007",
    "currency": "THB",
    "notes": null,
    "total_amount": "1250.00",
    "created_by": "9d0c8b7a-6f5e-4d3c-2b1a-0f9e8d7c6b5a",
    "created_at": "2024-03-15T09:12:00Z",
    "updated_at": "2024-03-15T09:12:00Z"
}))]
pub struct DocumentSummary {
    pub id: Uuid,
    pub kind: DocumentKind,
    /// `<PREFIX>-<YYYYMM>-<NNNN>`
    pub number: String,
    pub document_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: DocumentStatus,
    pub counterparty_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub reference: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<document::Model> for DocumentSummary {
    fn from(model: document::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            number: model.number,
            document_date: model.document_date,
            due_date: model.due_date,
            status: model.status,
            counterparty_id: model.counterparty_id,
            asset_id: model.asset_id,
            reference: model.reference,
            currency: model.currency,
            notes: model.notes,
            total_amount: model.total_amount,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineItemView {
    pub id: Uuid,
    pub line_no: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Exact quantity x unit_price
    pub line_total: Decimal,
}

impl From<document_item::Model> for LineItemView {
    fn from(model: document_item::Model) -> Self {
        Self {
            id: model.id,
            line_no: model.line_no,
            description: model.description,
            quantity: model.quantity,
            unit_price: model.unit_price,
            line_total: model.line_total,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: DocumentSummary,
    pub items: Vec<LineItemView>,
}

impl From<DocumentWithItems> for DocumentDetail {
    fn from(value: DocumentWithItems) -> Self {
        Self {
            document: value.document.into(),
            items: value.items.into_iter().map(LineItemView::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "kind": "BillingNote",
    "document_date": "2024-03-15",
    "due_date": "2024-04-15",
    "counterparty_id": "5a1d2f1e-3c1b-4f52-9b75-7d1e2c3a4b5c",
    "reference": "INV-202403-0007",
    "items": [
        {"description": "Engine service", "quantity": "1", "unit_price": "1250.00"}
    ]
}))]
pub struct CreateDocumentRequest {
    pub kind: DocumentKind,
    /// Defaults to today
    pub document_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub counterparty_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub reference: Option<String>,
    /// Defaults to the configured currency
    pub currency: Option<String>,
    pub notes: Option<String>,
    /// Used only when no items are given
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
}

impl CreateDocumentRequest {
    fn into_command(self, created_by: Uuid, default_currency: &str) -> CreateDocumentCommand {
        CreateDocumentCommand {
            kind: self.kind,
            document_date: self
                .document_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            due_date: self.due_date,
            counterparty_id: self.counterparty_id,
            asset_id: self.asset_id,
            reference: self.reference,
            currency: self
                .currency
                .unwrap_or_else(|| default_currency.to_string()),
            notes: self.notes,
            total_amount: self.total_amount,
            created_by,
            items: self.items,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({"status": "Paid"}))]
pub struct UpdateStatusRequest {
    pub status: DocumentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusChangeResponse {
    pub id: Uuid,
    pub number: String,
    pub old_status: DocumentStatus,
    pub status: DocumentStatus,
    /// False when the document already had the requested status
    pub changed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceItemsRequest {
    pub items: Vec<LineItemInput>,
}

#[utoipa::path(
    get,
    path = "/api/v1/documents",
    params(DocumentListQuery),
    responses(
        (status = 200, description = "Documents listed", body = ApiResponse<PaginatedResponse<DocumentSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<DocumentListQuery>,
) -> ApiResult<PaginatedResponse<DocumentSummary>> {
    let (page, limit) = page_window(query.page, query.limit, &state.config);
    let filter = DocumentFilter {
        kind: query.kind,
        status: query.status,
        counterparty_id: query.counterparty_id,
        from: query.from,
        to: query.to,
    };

    let (records, total) = state
        .document_service()
        .list(&filter, page, limit)
        .await?;
    let items = records.into_iter().map(DocumentSummary::from).collect();

    Ok(Json(ApiResponse::success(paginate(items, total, page, limit))))
}

#[utoipa::path(
    post,
    path = "/api/v1/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = ApiResponse<DocumentDetail>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Counterparty or asset not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Transaction rolled back", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn create_document(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DocumentDetail>>), ServiceError> {
    let command = payload.into_command(user.user_id, &state.config.default_currency);
    let created = state.document_service().create(command).await?;
    Ok(created_response(DocumentDetail::from(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document with its items", body = ApiResponse<DocumentDetail>),
        (status = 404, description = "Document not found", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DocumentDetail> {
    let document = state.document_service().get(id).await?;
    Ok(Json(ApiResponse::success(DocumentDetail::from(document))))
}

#[utoipa::path(
    put,
    path = "/api/v1/documents/{id}/status",
    request_body = UpdateStatusRequest,
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<StatusChangeResponse>),
        (status = 400, description = "Status not valid for this kind", body = crate::errors::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Document is void", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn update_document_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<StatusChangeResponse> {
    let change = state
        .document_service()
        .update_status(UpdateDocumentStatusCommand {
            document_id: id,
            new_status: payload.status,
        })
        .await?;

    Ok(Json(ApiResponse::success(StatusChangeResponse {
        id: change.document.id,
        changed: change.changed(),
        number: change.document.number,
        old_status: change.old_status,
        status: change.new_status,
    })))
}

#[utoipa::path(
    put,
    path = "/api/v1/documents/{id}/items",
    request_body = ReplaceItemsRequest,
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Items replaced and total recomputed", body = ApiResponse<DocumentDetail>),
        (status = 400, description = "Invalid items", body = crate::errors::ErrorResponse),
        (status = 404, description = "Document not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Document no longer editable", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn replace_document_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReplaceItemsRequest>,
) -> ApiResult<DocumentDetail> {
    let updated = state
        .document_service()
        .replace_items(ReplaceDocumentItemsCommand {
            document_id: id,
            items: payload.items,
        })
        .await?;
    Ok(Json(ApiResponse::success(DocumentDetail::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document and its items deleted"),
        (status = 404, description = "Document not found", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state
        .document_service()
        .delete(DeleteDocumentCommand { document_id: id })
        .await?;
    Ok(no_content_response())
}
