use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bizdesk API",
        version = "0.1.0",
        description = r#"
# Bizdesk back-office API

Sequentially numbered business documents (purchase requests and orders,
invoices, receipts, billing notes, payment vouchers, job orders, repair
tickets), counterparties, fixed assets, file attachments and a read-only
vehicle registry.

## Authentication

Log in with `POST /auth/login`. The response sets an HTTP-only session
cookie that must accompany every `/api/v1` request.

## Document numbers

Numbers follow `<PREFIX>-<YYYYMM>-<NNNN>` and restart at `0001` every month.
"#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Session login and logout"),
        (name = "documents", description = "Numbered business documents"),
        (name = "counterparties", description = "Customers and vendors"),
        (name = "assets", description = "Fixed asset register"),
        (name = "attachments", description = "Uploaded files"),
        (name = "search", description = "Typeahead lookups"),
        (name = "lookups", description = "Reference data"),
        (name = "vehicles", description = "Vehicle registry")
    ),
    paths(
        crate::auth::login_handler,
        crate::auth::logout_handler,
        crate::auth::me_handler,

        crate::handlers::documents::list_documents,
        crate::handlers::documents::create_document,
        crate::handlers::documents::get_document,
        crate::handlers::documents::update_document_status,
        crate::handlers::documents::replace_document_items,
        crate::handlers::documents::delete_document,

        crate::handlers::counterparties::list_counterparties,
        crate::handlers::counterparties::create_counterparty,
        crate::handlers::counterparties::get_counterparty,
        crate::handlers::counterparties::update_counterparty,
        crate::handlers::counterparties::delete_counterparty,

        crate::handlers::assets::list_assets,
        crate::handlers::assets::create_asset,
        crate::handlers::assets::get_asset,
        crate::handlers::assets::update_asset,
        crate::handlers::assets::delete_asset,

        crate::handlers::attachments::upload_attachment,
        crate::handlers::attachments::list_attachments,
        crate::handlers::attachments::get_attachment,
        crate::handlers::attachments::delete_attachment,
        crate::handlers::attachments::download_file,

        crate::handlers::search::search_counterparties,
        crate::handlers::search::search_assets,
        crate::handlers::search::search_documents,

        crate::handlers::lookups::document_kinds,
        crate::handlers::lookups::next_number,

        crate::handlers::vehicles::get_vehicle,
    ),
    components(
        schemas(
            crate::auth::AuthUser,
            crate::auth::LoginCredentials,
            crate::auth::LoginResponse,

            crate::entities::document::DocumentKind,
            crate::entities::document::DocumentStatus,
            crate::entities::counterparty::CounterpartyKind,
            crate::entities::asset::AssetStatus,

            crate::commands::documents::LineItemInput,
            crate::handlers::documents::DocumentSummary,
            crate::handlers::documents::LineItemView,
            crate::handlers::documents::DocumentDetail,
            crate::handlers::documents::CreateDocumentRequest,
            crate::handlers::documents::UpdateStatusRequest,
            crate::handlers::documents::StatusChangeResponse,
            crate::handlers::documents::ReplaceItemsRequest,

            crate::handlers::counterparties::CounterpartySummary,
            crate::handlers::counterparties::CreateCounterpartyRequest,
            crate::handlers::counterparties::UpdateCounterpartyRequest,

            crate::handlers::assets::AssetSummary,
            crate::handlers::assets::CreateAssetRequest,
            crate::handlers::assets::UpdateAssetRequest,

            crate::handlers::attachments::AttachmentSummary,
            crate::handlers::attachments::UploadForm,

            crate::handlers::search::CounterpartyHit,
            crate::handlers::search::AssetHit,
            crate::handlers::search::DocumentHit,

            crate::handlers::lookups::DocumentKindInfo,
            crate::handlers::lookups::NextNumberResponse,

            crate::handlers::vehicles::VehicleView,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
