use crate::{
    auth::AuthUser,
    entities::attachment,
    errors::ServiceError,
    events::Event,
    handlers::common::{created_response, no_content_response},
    services::attachments::NewUpload,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttachmentListQuery {
    /// `documents`, `assets` or `counterparties`
    pub area: Option<String>,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttachmentSummary {
    pub id: Uuid,
    #[schema(example = "documents")]
    pub area: String,
    pub owner_id: Option<Uuid>,
    #[schema(example = "quotation.pdf")]
    pub original_name: String,
    #[schema(example = "4be0643f1d98473b8c2e0f3d7a9c1b52.pdf")]
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    #[schema(example = "/api/v1/files/documents/4be0643f1d98473b8c2e0f3d7a9c1b52.pdf")]
    pub download_url: String,
}

impl From<attachment::Model> for AttachmentSummary {
    fn from(model: attachment::Model) -> Self {
        let download_url = format!("/api/v1/files/{}/{}", model.area, model.stored_name);
        Self {
            id: model.id,
            area: model.area,
            owner_id: model.owner_id,
            original_name: model.original_name,
            stored_name: model.stored_name,
            content_type: model.content_type,
            size_bytes: model.size_bytes,
            uploaded_by: model.uploaded_by,
            created_at: model.created_at,
            download_url,
        }
    }
}

/// Multipart form accepted by the upload endpoint
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    area: String,
    owner_id: Option<Uuid>,
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

fn multipart_error(err: MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(err.body_text())
    } else {
        ServiceError::ValidationError(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// Header-safe file name for `Content-Disposition`
fn disposition_name(original_name: &str) -> String {
    let cleaned: String = original_name
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && *c != '"' && *c != '\\')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/attachments",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = ApiResponse<AttachmentSummary>),
        (status = 400, description = "Missing field or unknown area", body = crate::errors::ErrorResponse),
        (status = 413, description = "File too large", body = crate::errors::ErrorResponse)
    ),
    tag = "attachments"
)]
pub async fn upload_attachment(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<AttachmentSummary>>), ServiceError> {
    let mut area = None;
    let mut owner_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("area") => area = Some(field.text().await.map_err(multipart_error)?),
            Some("owner_id") => {
                let raw = field.text().await.map_err(multipart_error)?;
                if !raw.trim().is_empty() {
                    let parsed = Uuid::parse_str(raw.trim()).map_err(|_| {
                        ServiceError::ValidationError(format!("owner_id '{}' is not a UUID", raw))
                    })?;
                    owner_id = Some(parsed);
                }
            }
            Some("file") => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((original_name, content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let area = area.ok_or_else(|| ServiceError::ValidationError("area is required".into()))?;
    let (original_name, content_type, data) =
        file.ok_or_else(|| ServiceError::ValidationError("file is required".into()))?;

    let stored = state
        .attachment_service()
        .upload(NewUpload {
            area: area.trim().to_string(),
            owner_id,
            original_name,
            content_type,
            data,
            uploaded_by: user.user_id,
        })
        .await?;

    state
        .event_sender
        .send_or_log(Event::AttachmentUploaded {
            attachment_id: stored.id,
            area: stored.area.clone(),
        })
        .await;

    Ok(created_response(AttachmentSummary::from(stored)))
}

#[utoipa::path(
    get,
    path = "/api/v1/attachments",
    params(AttachmentListQuery),
    responses(
        (status = 200, description = "Attachments listed", body = ApiResponse<Vec<AttachmentSummary>>)
    ),
    tag = "attachments"
)]
pub async fn list_attachments(
    State(state): State<AppState>,
    Query(query): Query<AttachmentListQuery>,
) -> ApiResult<Vec<AttachmentSummary>> {
    let rows = state
        .attachment_service()
        .list(query.area.as_deref(), query.owner_id)
        .await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(AttachmentSummary::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/attachments/{id}",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses(
        (status = 200, description = "Attachment metadata", body = ApiResponse<AttachmentSummary>),
        (status = 404, description = "Attachment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "attachments"
)]
pub async fn get_attachment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<AttachmentSummary> {
    let found = state.attachment_service().get(id).await?;
    Ok(Json(ApiResponse::success(AttachmentSummary::from(found))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/attachments/{id}",
    params(("id" = Uuid, Path, description = "Attachment ID")),
    responses(
        (status = 204, description = "Row and file removed"),
        (status = 404, description = "Attachment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "attachments"
)]
pub async fn delete_attachment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.attachment_service().delete(id).await?;
    state
        .event_sender
        .send_or_log(Event::AttachmentDeleted(id))
        .await;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{area}/{name}",
    params(
        ("area" = String, Path, description = "Upload area"),
        ("name" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 400, description = "Rejected path", body = crate::errors::ErrorResponse),
        (status = 404, description = "File not found", body = crate::errors::ErrorResponse)
    ),
    tag = "attachments"
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path((area, name)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ServiceError> {
    let (model, path) = state.attachment_service().resolve(&area, &name).await?;

    let served = ServeFile::new(&path)
        .oneshot(request)
        .await
        .map_err(|e| ServiceError::StorageError(e.to_string()))?;
    let mut response = served.map(Body::new);

    if response.status().is_success() {
        if let Ok(value) = HeaderValue::from_str(&model.content_type) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        let disposition = format!(
            "inline; filename=\"{}\"",
            disposition_name(&model.original_name)
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            response
                .headers_mut()
                .insert(header::CONTENT_DISPOSITION, value);
        }
    }
    Ok(response)
}
