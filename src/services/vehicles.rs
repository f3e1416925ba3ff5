use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::EntityTrait;
use tracing::instrument;

use crate::db::DbPool;
use crate::entities::vehicle;
use crate::errors::ServiceError;

/// 17 characters, no I, O or Q
static VIN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").expect("valid VIN regex"));

/// Upper-cases and validates a VIN.
pub fn normalize_vin(raw: &str) -> Result<String, ServiceError> {
    let vin = raw.trim().to_ascii_uppercase();
    if VIN_PATTERN.is_match(&vin) {
        Ok(vin)
    } else {
        Err(ServiceError::ValidationError(format!(
            "'{}' is not a valid 17-character VIN",
            raw.trim()
        )))
    }
}

/// Lookups against the separately configured vehicle registry
#[derive(Clone)]
pub struct VehicleService {
    db_pool: Option<Arc<DbPool>>,
}

impl VehicleService {
    pub fn new(db_pool: Option<Arc<DbPool>>) -> Self {
        Self { db_pool }
    }

    pub fn is_configured(&self) -> bool {
        self.db_pool.is_some()
    }

    #[instrument(skip(self))]
    pub async fn find_by_vin(&self, raw_vin: &str) -> Result<vehicle::Model, ServiceError> {
        let vin = normalize_vin(raw_vin)?;
        let db = self.db_pool.as_ref().ok_or_else(|| {
            ServiceError::ServiceUnavailable("Vehicle registry is not configured".to_string())
        })?;

        vehicle::Entity::find_by_id(vin.clone())
            .one(db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Vehicle {} not found", vin)))
    }
}
