use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::counterparty::{self, CounterpartyKind};
use crate::entities::document;
use crate::errors::ServiceError;
use crate::services::documents::{contains_pattern, SEARCH_LIMIT};

#[derive(Debug, Clone)]
pub struct CounterpartyInput {
    pub code: String,
    pub name: String,
    pub kind: CounterpartyKind,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Partial update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct CounterpartyChanges {
    pub name: Option<String>,
    pub kind: Option<CounterpartyKind>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone)]
pub struct CounterpartyService {
    db_pool: Arc<DbPool>,
}

impl CounterpartyService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn find(&self, id: Uuid) -> Result<counterparty::Model, ServiceError> {
        counterparty::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Counterparty {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<counterparty::Model, ServiceError> {
        self.find(id).await
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        kind: Option<CounterpartyKind>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<counterparty::Model>, u64), ServiceError> {
        let mut select = counterparty::Entity::find();
        if let Some(kind) = kind {
            select = select.filter(counterparty::Column::Kind.eq(kind));
        }
        let paginator = select
            .order_by_asc(counterparty::Column::Code)
            .paginate(self.db_pool.as_ref(), limit);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((rows, total))
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: CounterpartyInput) -> Result<counterparty::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let code = input.code.trim().to_uppercase();

        let existing = counterparty::Entity::find()
            .filter(counterparty::Column::Code.eq(code.clone()))
            .count(db)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Counterparty code {} is already in use",
                code
            )));
        }

        let now = Utc::now();
        let model = counterparty::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(input.name),
            kind: Set(input.kind),
            tax_id: Set(input.tax_id),
            email: Set(input.email),
            phone: Set(input.phone),
            address: Set(input.address),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(counterparty_id = %model.id, "counterparty created");
        Ok(model)
    }

    #[instrument(skip(self, changes))]
    pub async fn update(
        &self,
        id: Uuid,
        changes: CounterpartyChanges,
    ) -> Result<counterparty::Model, ServiceError> {
        let current = self.find(id).await?;
        if let Some(kind) = changes.kind {
            if kind != current.kind {
                self.ensure_roles_kept(&current, kind).await?;
            }
        }
        let mut active: counterparty::ActiveModel = current.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(kind) = changes.kind {
            active.kind = Set(kind);
        }
        if changes.tax_id.is_some() {
            active.tax_id = Set(changes.tax_id);
        }
        if changes.email.is_some() {
            active.email = Set(changes.email);
        }
        if changes.phone.is_some() {
            active.phone = Set(changes.phone);
        }
        if changes.address.is_some() {
            active.address = Set(changes.address);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(self.db_pool.as_ref()).await?)
    }

    /// A kind change must still satisfy the role of every document already issued.
    async fn ensure_roles_kept(
        &self,
        current: &counterparty::Model,
        kind: CounterpartyKind,
    ) -> Result<(), ServiceError> {
        let issued: Vec<document::DocumentKind> = document::Entity::find()
            .select_only()
            .column(document::Column::Kind)
            .distinct()
            .filter(document::Column::CounterpartyId.eq(current.id))
            .into_tuple()
            .all(self.db_pool.as_ref())
            .await?;

        match issued
            .into_iter()
            .find(|doc_kind| !kind.satisfies(doc_kind.counterparty_role()))
        {
            Some(doc_kind) => Err(ServiceError::Conflict(format!(
                "Counterparty {} has {} documents and must stay a {}",
                current.code,
                doc_kind,
                doc_kind.counterparty_role()
            ))),
            None => Ok(()),
        }
    }

    /// Refused while any document still points at the counterparty.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let current = self.find(id).await?;

        let references = document::Entity::find()
            .filter(document::Column::CounterpartyId.eq(id))
            .count(db)
            .await?;
        if references > 0 {
            return Err(ServiceError::Conflict(format!(
                "Counterparty {} is referenced by {} document(s)",
                current.code, references
            )));
        }

        counterparty::Entity::delete_by_id(id).exec(db).await?;
        info!(counterparty_id = %id, "counterparty deleted");
        Ok(())
    }

    /// Typeahead on code and name, optionally restricted to a role.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        role: Option<CounterpartyKind>,
        limit: u64,
    ) -> Result<Vec<counterparty::Model>, ServiceError> {
        let term = query.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let mut select = counterparty::Entity::find().filter(
            Condition::any()
                .add(counterparty::Column::Code.like(contains_pattern(&term.to_uppercase())))
                .add(counterparty::Column::Name.like(contains_pattern(term))),
        );
        if let Some(role) = role {
            select = select.filter(
                counterparty::Column::Kind.is_in([role, CounterpartyKind::Both]),
            );
        }

        let rows = select
            .order_by_asc(counterparty::Column::Name)
            .limit(limit.clamp(1, SEARCH_LIMIT))
            .all(self.db_pool.as_ref())
            .await?;
        Ok(rows)
    }
}
