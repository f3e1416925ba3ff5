use crate::{
    config::AppConfig, errors::ServiceError, services::documents::SEARCH_LIMIT, ApiResponse,
    PaginatedResponse,
};
use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use validator::Validate;

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}

/// Page number (1-based) and page size after applying configured defaults and caps
pub fn page_window(page: Option<u64>, limit: Option<u64>, config: &AppConfig) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit
        .unwrap_or(config.api_default_page_size)
        .clamp(1, config.api_max_page_size);
    (page, limit)
}

pub fn paginate<T>(items: Vec<T>, total: u64, page: u64, limit: u64) -> PaginatedResponse<T> {
    let total_pages = if total == 0 {
        0
    } else {
        (total + limit - 1) / limit
    };
    PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    }
}

/// Typeahead query parameters
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Text typed so far
    #[serde(default)]
    pub q: String,
    /// At most 25
    pub limit: Option<u64>,
}

impl SearchQuery {
    pub fn limit(&self) -> u64 {
        search_limit(self.limit)
    }
}

/// Requested typeahead size, defaulting to and capped at [`SEARCH_LIMIT`]
pub fn search_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(SEARCH_LIMIT).clamp(1, SEARCH_LIMIT)
}
