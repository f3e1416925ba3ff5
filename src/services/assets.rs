use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{DatabaseAccess, DbPool};
use crate::entities::asset::{self, AssetStatus};
use crate::entities::document;
use crate::errors::ServiceError;
use crate::services::{
    documents::{contains_pattern, SEARCH_LIMIT},
    numbering,
};

#[derive(Debug, Clone)]
pub struct AssetInput {
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub location: Option<String>,
    pub status: Option<AssetStatus>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_cost: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AssetChanges {
    pub name: Option<String>,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub location: Option<String>,
    pub status: Option<AssetStatus>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_cost: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct AssetService {
    db: DatabaseAccess,
}

impl AssetService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            db: DatabaseAccess::new(db_pool),
        }
    }

    async fn find(&self, id: Uuid) -> Result<asset::Model, ServiceError> {
        asset::Entity::find_by_id(id)
            .one(self.db.get_pool())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Asset {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<asset::Model, ServiceError> {
        self.find(id).await
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        status: Option<AssetStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<asset::Model>, u64), ServiceError> {
        let mut select = asset::Entity::find();
        if let Some(status) = status {
            select = select.filter(asset::Column::Status.eq(status));
        }
        let paginator = select
            .order_by_desc(asset::Column::AssetTag)
            .paginate(self.db.get_pool(), limit);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((rows, total))
    }

    /// Registers an asset under the next `AS-YYYYMM-NNNN` tag of the current month.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: AssetInput) -> Result<asset::Model, ServiceError> {
        let model = self
            .db
            .transaction("create_asset", move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let asset_tag = numbering::next_asset_tag(txn, now.date_naive()).await?;

                    let model = asset::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        asset_tag: Set(asset_tag),
                        name: Set(input.name),
                        category: Set(input.category),
                        serial_number: Set(input.serial_number),
                        location: Set(input.location),
                        status: Set(input.status.unwrap_or(AssetStatus::InService)),
                        purchase_date: Set(input.purchase_date),
                        purchase_cost: Set(input.purchase_cost),
                        notes: Set(input.notes),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await?;
                    Ok(model)
                })
            })
            .await?;

        info!(asset_id = %model.id, asset_tag = %model.asset_tag, "asset registered");
        Ok(model)
    }

    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: Uuid, changes: AssetChanges) -> Result<asset::Model, ServiceError> {
        let current = self.find(id).await?;
        let mut active: asset::ActiveModel = current.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if changes.category.is_some() {
            active.category = Set(changes.category);
        }
        if changes.serial_number.is_some() {
            active.serial_number = Set(changes.serial_number);
        }
        if changes.location.is_some() {
            active.location = Set(changes.location);
        }
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if changes.purchase_date.is_some() {
            active.purchase_date = Set(changes.purchase_date);
        }
        if changes.purchase_cost.is_some() {
            active.purchase_cost = Set(changes.purchase_cost);
        }
        if changes.notes.is_some() {
            active.notes = Set(changes.notes);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(self.db.get_pool()).await?)
    }

    /// Refused while any document still points at the asset.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db.get_pool();
        let current = self.find(id).await?;

        let references = document::Entity::find()
            .filter(document::Column::AssetId.eq(id))
            .count(db)
            .await?;
        if references > 0 {
            return Err(ServiceError::Conflict(format!(
                "Asset {} is referenced by {} document(s)",
                current.asset_tag, references
            )));
        }

        asset::Entity::delete_by_id(id).exec(db).await?;
        info!(asset_id = %id, "asset deleted");
        Ok(())
    }

    /// Typeahead on tag, name and serial number.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: u64) -> Result<Vec<asset::Model>, ServiceError> {
        let term = query.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let rows = asset::Entity::find()
            .filter(
                Condition::any()
                    .add(asset::Column::AssetTag.like(contains_pattern(term)))
                    .add(asset::Column::Name.like(contains_pattern(term)))
                    .add(asset::Column::SerialNumber.like(contains_pattern(term))),
            )
            .order_by_asc(asset::Column::Name)
            .limit(limit.clamp(1, SEARCH_LIMIT))
            .all(self.db.get_pool())
            .await?;
        Ok(rows)
    }
}
