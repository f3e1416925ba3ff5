//! Multi-row document writes.
//!
//! Every operation here runs on one dedicated transactional connection: the
//! parent row, its line items and the aggregated total either all persist or
//! none do.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{DatabaseAccess, DbPool};
use crate::entities::{
    asset, counterparty,
    document::{self, DocumentKind},
    document_item,
};
use crate::errors::ServiceError;
use crate::metrics::{DOCUMENTS_CREATED, DOCUMENT_CREATION_FAILURES};
use crate::services::numbering;

/// One submitted line
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Everything needed to insert a document and its lines
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub kind: DocumentKind,
    pub document_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub counterparty_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub reference: Option<String>,
    pub currency: String,
    pub notes: Option<String>,
    /// Used only when `items` is empty
    pub total_amount: Option<Decimal>,
    pub created_by: Uuid,
    pub items: Vec<NewLineItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentWithItems {
    #[serde(flatten)]
    pub document: document::Model,
    pub items: Vec<document_item::Model>,
}

/// Decimal places accepted on a quantity
pub const QUANTITY_SCALE: u32 = 4;
/// Decimal places accepted on a price or an explicit total
pub const MONEY_SCALE: u32 = 2;

/// Exclusive upper bound on a line or document amount; the amount columns
/// hold ten integer digits.
pub fn amount_limit() -> Decimal {
    Decimal::new(10_000_000_000, 0)
}

/// Exact `quantity * unit_price`; never rounded, so line totals always add up
/// to the document total.
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, ServiceError> {
    quantity
        .checked_mul(unit_price)
        .filter(|amount| *amount < amount_limit())
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Line amount {} x {} is out of range",
                quantity, unit_price
            ))
        })
}

/// Inserts `items` under `document_id`, numbering lines from 1, and returns
/// the rows together with their summed total.
async fn insert_items<C>(
    conn: &C,
    document_id: Uuid,
    items: Vec<NewLineItem>,
) -> Result<(Vec<document_item::Model>, Decimal), ServiceError>
where
    C: ConnectionTrait,
{
    let mut total = Decimal::ZERO;
    let mut rows = Vec::with_capacity(items.len());
    let now = Utc::now();

    for (index, item) in items.into_iter().enumerate() {
        let amount = line_total(item.quantity, item.unit_price)?;
        let row = document_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            document_id: Set(document_id),
            line_no: Set(index as i32 + 1),
            description: Set(item.description),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            line_total: Set(amount),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        total = total
            .checked_add(amount)
            .filter(|sum| *sum < amount_limit())
            .ok_or_else(|| {
                ServiceError::ValidationError("Document total is out of range".to_string())
            })?;
        rows.push(row);
    }

    Ok((rows, total))
}

async fn check_counterparty<C>(
    conn: &C,
    counterparty_id: Uuid,
    kind: DocumentKind,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let party = counterparty::Entity::find_by_id(counterparty_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Counterparty {} not found", counterparty_id))
        })?;

    let role = kind.counterparty_role();
    if !party.kind.satisfies(role) {
        return Err(ServiceError::ValidationError(format!(
            "{} requires a {} counterparty, {} is a {}",
            kind, role, party.code, party.kind
        )));
    }
    Ok(())
}

async fn check_asset<C>(conn: &C, asset_id: Option<Uuid>) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let Some(asset_id) = asset_id else {
        return Ok(());
    };
    asset::Entity::find_by_id(asset_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| ServiceError::NotFound(format!("Asset {} not found", asset_id)))
}

async fn find_document<C>(conn: &C, document_id: Uuid) -> Result<document::Model, ServiceError>
where
    C: ConnectionTrait,
{
    document::Entity::find_by_id(document_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Document {} not found", document_id)))
}

/// Transactional writer for documents and their line items
#[derive(Clone)]
pub struct DocumentWriter {
    db: DatabaseAccess,
}

impl DocumentWriter {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            db: DatabaseAccess::new(db_pool),
        }
    }

    /// Numbers and inserts a document, inserts its items and stores the total.
    #[instrument(skip(self, new), fields(kind = %new.kind, items = new.items.len()))]
    pub async fn create(&self, new: NewDocument) -> Result<DocumentWithItems, ServiceError> {
        let kind = new.kind;
        let result = self
            .db
            .transaction("create_document", move |txn| {
                Box::pin(async move {
                    check_counterparty(txn, new.counterparty_id, new.kind).await?;
                    check_asset(txn, new.asset_id).await?;

                    let number =
                        numbering::next_document_number(txn, new.kind, new.document_date).await?;
                    let now = Utc::now();
                    let explicit_total = new.total_amount.unwrap_or(Decimal::ZERO);
                    let has_items = !new.items.is_empty();

                    let parent = document::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        kind: Set(new.kind),
                        number: Set(number),
                        document_date: Set(new.document_date),
                        due_date: Set(new.due_date),
                        status: Set(new.kind.default_status()),
                        counterparty_id: Set(new.counterparty_id),
                        asset_id: Set(new.asset_id),
                        reference: Set(new.reference),
                        currency: Set(new.currency),
                        notes: Set(new.notes),
                        total_amount: Set(if has_items {
                            Decimal::ZERO
                        } else {
                            explicit_total
                        }),
                        created_by: Set(new.created_by),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await?;

                    if !has_items {
                        return Ok(DocumentWithItems {
                            document: parent,
                            items: Vec::new(),
                        });
                    }

                    let (items, total) = insert_items(txn, parent.id, new.items).await?;

                    let mut active: document::ActiveModel = parent.into();
                    active.total_amount = Set(total);
                    let document = active.update(txn).await?;

                    Ok(DocumentWithItems { document, items })
                })
            })
            .await;

        match &result {
            Ok(created) => {
                DOCUMENTS_CREATED
                    .with_label_values(&[&kind.to_string()])
                    .inc();
                info!(
                    document_id = %created.document.id,
                    number = %created.document.number,
                    total = %created.document.total_amount,
                    "document created"
                );
            }
            Err(_) => DOCUMENT_CREATION_FAILURES.inc(),
        }

        result
    }

    /// Swaps the full item set and recomputes the total.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn replace_items(
        &self,
        document_id: Uuid,
        items: Vec<NewLineItem>,
    ) -> Result<DocumentWithItems, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one line item is required".to_string(),
            ));
        }

        self.db
            .transaction("replace_document_items", move |txn| {
                Box::pin(async move {
                    let current = find_document(txn, document_id).await?;
                    if current.status.locks_items() {
                        return Err(ServiceError::Conflict(format!(
                            "Document {} is {}; its items can no longer change",
                            current.number, current.status
                        )));
                    }

                    document_item::Entity::delete_many()
                        .filter(document_item::Column::DocumentId.eq(document_id))
                        .exec(txn)
                        .await?;

                    let (items, total) = insert_items(txn, document_id, items).await?;

                    let mut active: document::ActiveModel = current.into();
                    active.total_amount = Set(total);
                    active.updated_at = Set(Utc::now());
                    let document = active.update(txn).await?;

                    Ok(DocumentWithItems { document, items })
                })
            })
            .await
    }

    /// Deletes the document and its items; returns the removed document.
    #[instrument(skip(self))]
    pub async fn delete(&self, document_id: Uuid) -> Result<document::Model, ServiceError> {
        self.db
            .transaction("delete_document", move |txn| {
                Box::pin(async move {
                    let current = find_document(txn, document_id).await?;

                    document_item::Entity::delete_many()
                        .filter(document_item::Column::DocumentId.eq(document_id))
                        .exec(txn)
                        .await?;
                    document::Entity::delete_by_id(document_id).exec(txn).await?;

                    Ok(current)
                })
            })
            .await
    }
}

/// Loads a document together with its items ordered by line number.
pub async fn load_with_items<C>(
    conn: &C,
    document_id: Uuid,
) -> Result<DocumentWithItems, ServiceError>
where
    C: ConnectionTrait,
{
    let document = find_document(conn, document_id).await?;
    let items = document_item::Entity::find()
        .filter(document_item::Column::DocumentId.eq(document_id))
        .order_by_asc(document_item::Column::LineNo)
        .all(conn)
        .await?;
    Ok(DocumentWithItems { document, items })
}
