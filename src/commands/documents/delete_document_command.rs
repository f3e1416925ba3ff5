use crate::{
    commands::Command,
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    services::document_writer::DocumentWriter,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDocumentCommand {
    pub document_id: Uuid,
}

#[async_trait]
impl Command for DeleteDocumentCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, event_sender), fields(document_id = %self.document_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let removed = DocumentWriter::new(db_pool).delete(self.document_id).await?;
        info!(number = %removed.number, "Document deleted");

        event_sender
            .send_or_log(Event::DocumentDeleted(self.document_id))
            .await;
        Ok(())
    }
}
