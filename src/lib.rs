//! Bizdesk API Library
//!
//! Numbered business documents, counterparties, assets, attachments and a
//! read-only vehicle registry behind a session-authenticated JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{delete, get, post, put},
    Extension, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthService};
use crate::db::DbPool;
use crate::services::{
    assets::AssetService, attachments::AttachmentService, counterparties::CounterpartyService,
    documents::DocumentService, numbering::NumberingService, vehicles::VehicleService,
};

/// Slack on top of the upload limit for multipart framing and the other fields
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub vehicles_db: Option<Arc<DbPool>>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        vehicles_db: Option<Arc<DbPool>>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let services =
            handlers::AppServices::new(db.clone(), vehicles_db.clone(), event_sender.clone(), &config);
        let auth = Arc::new(AuthService::new(
            auth::AuthConfig::from_app_config(&config),
            db.clone(),
            event_sender.clone(),
        ));
        Self {
            db,
            vehicles_db,
            config,
            event_sender,
            services,
            auth,
        }
    }

    pub fn document_service(&self) -> Arc<DocumentService> {
        self.services.documents.clone()
    }

    pub fn counterparty_service(&self) -> Arc<CounterpartyService> {
        self.services.counterparties.clone()
    }

    pub fn asset_service(&self) -> Arc<AssetService> {
        self.services.assets.clone()
    }

    pub fn attachment_service(&self) -> Arc<AttachmentService> {
        self.services.attachments.clone()
    }

    pub fn vehicle_service(&self) -> Arc<VehicleService> {
        self.services.vehicles.clone()
    }

    pub fn numbering_service(&self) -> Arc<NumberingService> {
        self.services.numbering.clone()
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`, each group gated by its permission
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{assets, attachments, counterparties, documents, lookups, search, vehicles};

    let documents_read = Router::new()
        .route("/documents", get(documents::list_documents))
        .route("/documents/:id", get(documents::get_document))
        .route("/search/documents", get(search::search_documents))
        .route("/lookups/document-kinds", get(lookups::document_kinds))
        .route("/lookups/next-number", get(lookups::next_number))
        .with_permission(perm::DOCUMENTS_READ);

    let documents_create = Router::new()
        .route("/documents", post(documents::create_document))
        .with_permission(perm::DOCUMENTS_CREATE);

    let documents_update = Router::new()
        .route("/documents/:id/status", put(documents::update_document_status))
        .route("/documents/:id/items", put(documents::replace_document_items))
        .with_permission(perm::DOCUMENTS_UPDATE);

    let documents_delete = Router::new()
        .route("/documents/:id", delete(documents::delete_document))
        .with_permission(perm::DOCUMENTS_DELETE);

    let counterparties_read = Router::new()
        .route("/counterparties", get(counterparties::list_counterparties))
        .route("/counterparties/:id", get(counterparties::get_counterparty))
        .route("/search/counterparties", get(search::search_counterparties))
        .with_permission(perm::COUNTERPARTIES_READ);

    let counterparties_manage = Router::new()
        .route("/counterparties", post(counterparties::create_counterparty))
        .route(
            "/counterparties/:id",
            put(counterparties::update_counterparty).delete(counterparties::delete_counterparty),
        )
        .with_permission(perm::COUNTERPARTIES_MANAGE);

    let assets_read = Router::new()
        .route("/assets", get(assets::list_assets))
        .route("/assets/:id", get(assets::get_asset))
        .route("/search/assets", get(search::search_assets))
        .with_permission(perm::ASSETS_READ);

    let assets_manage = Router::new()
        .route("/assets", post(assets::create_asset))
        .route(
            "/assets/:id",
            put(assets::update_asset).delete(assets::delete_asset),
        )
        .with_permission(perm::ASSETS_MANAGE);

    let attachments_read = Router::new()
        .route("/attachments", get(attachments::list_attachments))
        .route("/attachments/:id", get(attachments::get_attachment))
        .route("/files/:area/:name", get(attachments::download_file))
        .with_permission(perm::ATTACHMENTS_READ);

    let attachments_manage = Router::new()
        .route("/attachments", post(attachments::upload_attachment))
        .route("/attachments/:id", delete(attachments::delete_attachment))
        .with_permission(perm::ATTACHMENTS_MANAGE);

    let vehicles_read = Router::new()
        .route("/vehicles/:vin", get(vehicles::get_vehicle))
        .with_permission(perm::VEHICLES_READ);

    Router::new()
        .merge(documents_read)
        .merge(documents_create)
        .merge(documents_update)
        .merge(documents_delete)
        .merge(counterparties_read)
        .merge(counterparties_manage)
        .merge(assets_read)
        .merge(assets_manage)
        .merge(attachments_read)
        .merge(attachments_manage)
        .merge(vehicles_read)
}

/// CORS policy from config; `None` when nothing is configured and permissive
/// CORS is not allowed for this environment.
pub fn cors_layer(cfg: &config::AppConfig) -> Option<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if cfg.should_allow_permissive_cors() {
        Some(CorsLayer::permissive())
    } else {
        None
    }
}

/// Full application router: API, auth, probes, metrics and Swagger UI.
pub fn build_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let cors = cors_layer(&state.config).unwrap_or_else(CorsLayer::new);

    Router::<AppState>::new()
        .route("/", get(|| async { "bizdesk-api up" }))
        .route(
            "/metrics",
            get(|| async move {
                match metrics::metrics_handler().await {
                    Ok(body) => (StatusCode::OK, body),
                    Err(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        String::from("metrics error"),
                    ),
                }
            }),
        )
        .nest("/api/v1", api_v1_routes())
        .nest("/auth", auth::auth_routes().with_state(auth_service.clone()))
        .nest(
            "/health",
            health::health_routes(state.db.clone(), state.vehicles_db.clone()),
        )
        .merge(openapi::swagger_ui())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // auth_middleware finds the service in the request extensions
        .layer(Extension(auth_service))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
