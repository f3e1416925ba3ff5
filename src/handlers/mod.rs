pub mod assets;
pub mod attachments;
pub mod common;
pub mod counterparties;
pub mod documents;
pub mod lookups;
pub mod search;
pub mod vehicles;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    assets::AssetService, attachments::AttachmentService, counterparties::CounterpartyService,
    documents::DocumentService, numbering::NumberingService, vehicles::VehicleService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub documents: Arc<DocumentService>,
    pub counterparties: Arc<CounterpartyService>,
    pub assets: Arc<AssetService>,
    pub attachments: Arc<AttachmentService>,
    pub vehicles: Arc<VehicleService>,
    pub numbering: Arc<NumberingService>,
}

impl AppServices {
    /// `vehicles_db` is the optional read-only registry connection.
    pub fn new(
        db_pool: Arc<DbPool>,
        vehicles_db: Option<Arc<DbPool>>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        Self {
            documents: Arc::new(DocumentService::new(db_pool.clone(), event_sender)),
            counterparties: Arc::new(CounterpartyService::new(db_pool.clone())),
            assets: Arc::new(AssetService::new(db_pool.clone())),
            attachments: Arc::new(AttachmentService::new(
                db_pool.clone(),
                config.upload_dir.clone(),
                config.max_upload_bytes,
            )),
            vehicles: Arc::new(VehicleService::new(vehicles_db)),
            numbering: Arc::new(NumberingService::new(db_pool)),
        }
    }
}
