use crate::{
    commands::Command,
    db::DbPool,
    entities::document::{self, DocumentKind, DocumentStatus, Entity as Document},
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Checks a requested status against the kind and the current status.
pub fn check_transition(
    kind: DocumentKind,
    current: DocumentStatus,
    requested: DocumentStatus,
) -> Result<(), ServiceError> {
    if !kind.allows(requested) {
        return Err(ServiceError::InvalidStatus(format!(
            "{} is not a valid status for {}",
            requested, kind
        )));
    }
    if current.is_terminal() && current != requested {
        return Err(ServiceError::Conflict(format!(
            "Document is {} and can no longer change status",
            current
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDocumentStatusCommand {
    pub document_id: Uuid,
    pub new_status: DocumentStatus,
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub document: document::Model,
    pub old_status: DocumentStatus,
    pub new_status: DocumentStatus,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.old_status != self.new_status
    }
}

#[async_trait]
impl Command for UpdateDocumentStatusCommand {
    type Result = StatusChange;

    #[instrument(skip(self, db_pool, event_sender), fields(document_id = %self.document_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let db = db_pool.as_ref();
        let current = Document::find_by_id(self.document_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Document {} not found", self.document_id))
            })?;

        let old_status = current.status;
        check_transition(current.kind, old_status, self.new_status)?;

        // Same status: nothing to write
        if old_status == self.new_status {
            return Ok(StatusChange {
                document: current,
                old_status,
                new_status: self.new_status,
            });
        }

        let mut active: document::ActiveModel = current.into();
        active.status = Set(self.new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        info!(
            number = %updated.number,
            from = %old_status,
            to = %self.new_status,
            "Document status updated"
        );

        event_sender
            .send_or_log(Event::DocumentStatusChanged {
                document_id: self.document_id,
                old_status,
                new_status: self.new_status,
            })
            .await;

        Ok(StatusChange {
            document: updated,
            old_status,
            new_status: self.new_status,
        })
    }
}
