use crate::{
    commands::Command,
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    services::document_writer::{DocumentWithItems, DocumentWriter},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{validate_items, LineItemInput};

/// Swaps the whole item set of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceDocumentItemsCommand {
    pub document_id: Uuid,
    pub items: Vec<LineItemInput>,
}

#[async_trait]
impl Command for ReplaceDocumentItemsCommand {
    type Result = DocumentWithItems;

    #[instrument(skip(self, db_pool, event_sender), fields(document_id = %self.document_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        validate_items(&self.items)?;

        let items = self.items.iter().cloned().map(Into::into).collect();
        let updated = DocumentWriter::new(db_pool)
            .replace_items(self.document_id, items)
            .await?;

        info!(
            number = %updated.document.number,
            total = %updated.document.total_amount,
            "Document items replaced"
        );

        event_sender
            .send_or_log(Event::DocumentItemsReplaced {
                document_id: self.document_id,
                item_count: updated.items.len(),
            })
            .await;

        Ok(updated)
    }
}
