use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::{
    sea_query::LikeExpr, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use tracing::instrument;
use uuid::Uuid;

use crate::commands::documents::{
    CreateDocumentCommand, DeleteDocumentCommand, ReplaceDocumentItemsCommand, StatusChange,
    UpdateDocumentStatusCommand,
};
use crate::commands::Command;
use crate::db::DbPool;
use crate::entities::document::{self, DocumentKind, DocumentStatus};
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::document_writer::{load_with_items, DocumentWithItems};

/// Most rows a typeahead query returns
pub const SEARCH_LIMIT: u64 = 25;

/// `LIKE` pattern matching `term` anywhere, with `%`, `_` and `\` taken literally.
pub fn contains_pattern(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape('\\')
}

/// Filters accepted by the document listing
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub kind: Option<DocumentKind>,
    pub status: Option<DocumentStatus>,
    pub counterparty_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DocumentFilter {
    fn condition(&self) -> Condition {
        let mut cond = Condition::all();
        if let Some(kind) = self.kind {
            cond = cond.add(document::Column::Kind.eq(kind));
        }
        if let Some(status) = self.status {
            cond = cond.add(document::Column::Status.eq(status));
        }
        if let Some(counterparty_id) = self.counterparty_id {
            cond = cond.add(document::Column::CounterpartyId.eq(counterparty_id));
        }
        if let Some(from) = self.from {
            cond = cond.add(document::Column::DocumentDate.gte(from));
        }
        if let Some(to) = self.to {
            cond = cond.add(document::Column::DocumentDate.lte(to));
        }
        cond
    }
}

/// Document queries, with mutations delegated to commands
#[derive(Clone)]
pub struct DocumentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl DocumentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Lists documents newest first; returns the page and the filtered total.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &DocumentFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<document::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();
        let paginator = document::Entity::find()
            .filter(filter.condition())
            .order_by_desc(document::Column::DocumentDate)
            .order_by_desc(document::Column::Number)
            .paginate(db, limit);

        let total = paginator.num_items().await?;
        let documents = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((documents, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<DocumentWithItems, ServiceError> {
        load_with_items(self.db_pool.as_ref(), id).await
    }

    /// Numbers and stores a document with its items.
    #[instrument(skip(self, command))]
    pub async fn create(
        &self,
        command: CreateDocumentCommand,
    ) -> Result<DocumentWithItems, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        command: UpdateDocumentStatusCommand,
    ) -> Result<StatusChange, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self, command))]
    pub async fn replace_items(
        &self,
        command: ReplaceDocumentItemsCommand,
    ) -> Result<DocumentWithItems, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, command: DeleteDocumentCommand) -> Result<(), ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Typeahead on number and reference.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        kind: Option<DocumentKind>,
        limit: u64,
    ) -> Result<Vec<document::Model>, ServiceError> {
        let term = query.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let mut select = document::Entity::find().filter(
            Condition::any()
                .add(document::Column::Number.like(contains_pattern(term)))
                .add(document::Column::Reference.like(contains_pattern(term))),
        );
        if let Some(kind) = kind {
            select = select.filter(document::Column::Kind.eq(kind));
        }

        let documents = select
            .order_by_desc(document::Column::Number)
            .limit(limit.clamp(1, SEARCH_LIMIT))
            .all(self.db_pool.as_ref())
            .await?;
        Ok(documents)
    }
}
