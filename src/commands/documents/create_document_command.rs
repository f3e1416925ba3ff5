use crate::{
    commands::Command,
    db::DbPool,
    entities::document::DocumentKind,
    errors::ServiceError,
    events::{Event, EventSender},
    services::document_writer::{DocumentWithItems, DocumentWriter, NewDocument},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{valid_total, validate_items, LineItemInput};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDocumentCommand {
    pub kind: DocumentKind,
    pub document_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub counterparty_id: Uuid,
    pub asset_id: Option<Uuid>,
    #[validate(length(max = 100, message = "Reference is limited to 100 characters"))]
    pub reference: Option<String>,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(custom = "valid_total")]
    pub total_amount: Option<Decimal>,
    pub created_by: Uuid,
    pub items: Vec<LineItemInput>,
}

impl CreateDocumentCommand {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        validate_items(&self.items)?;
        if let Some(due) = self.due_date {
            if due < self.document_date {
                return Err(ServiceError::ValidationError(
                    "Due date cannot precede the document date".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn to_new_document(&self) -> NewDocument {
        NewDocument {
            kind: self.kind,
            document_date: self.document_date,
            due_date: self.due_date,
            counterparty_id: self.counterparty_id,
            asset_id: self.asset_id,
            reference: self.reference.clone(),
            currency: self.currency.to_ascii_uppercase(),
            notes: self.notes.clone(),
            total_amount: self.total_amount,
            created_by: self.created_by,
            items: self.items.iter().cloned().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Command for CreateDocumentCommand {
    type Result = DocumentWithItems;

    #[instrument(skip(self, db_pool, event_sender), fields(kind = %self.kind))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.check().map_err(|e| {
            error!(error = %e, "rejected document input");
            e
        })?;

        let created = DocumentWriter::new(db_pool)
            .create(self.to_new_document())
            .await?;

        event_sender
            .send_or_log(Event::DocumentCreated {
                document_id: created.document.id,
                kind: created.document.kind,
                number: created.document.number.clone(),
            })
            .await;

        Ok(created)
    }
}
