use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::document::{DocumentKind, DocumentStatus};

/// Capacity of the in-process event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Clonable handle used by commands and services to publish domain events.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes after a committed write; a closed channel never fails the request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!(error = %err, "event dropped");
        }
    }
}

/// Creates a sender plus the receiver to hand to [`process_events`].
pub fn channel() -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EventSender::new(tx), rx)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    DocumentCreated {
        document_id: Uuid,
        kind: DocumentKind,
        number: String,
    },
    DocumentStatusChanged {
        document_id: Uuid,
        old_status: DocumentStatus,
        new_status: DocumentStatus,
    },
    DocumentItemsReplaced {
        document_id: Uuid,
        item_count: usize,
    },
    DocumentDeleted(Uuid),
    AttachmentUploaded {
        attachment_id: Uuid,
        area: String,
    },
    AttachmentDeleted(Uuid),
    SessionOpened(Uuid),
    SessionClosed(Uuid),
}

/// Drains the channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::DocumentCreated {
                document_id,
                kind,
                number,
            } => info!(%document_id, %kind, %number, "document created"),
            Event::DocumentStatusChanged {
                document_id,
                old_status,
                new_status,
            } => info!(%document_id, %old_status, %new_status, "document status changed"),
            Event::DocumentItemsReplaced {
                document_id,
                item_count,
            } => info!(%document_id, item_count, "document items replaced"),
            Event::DocumentDeleted(document_id) => info!(%document_id, "document deleted"),
            Event::AttachmentUploaded {
                attachment_id,
                area,
            } => info!(%attachment_id, %area, "attachment uploaded"),
            Event::AttachmentDeleted(attachment_id) => {
                info!(%attachment_id, "attachment deleted")
            }
            Event::SessionOpened(user_id) => info!(%user_id, "session opened"),
            Event::SessionClosed(user_id) => info!(%user_id, "session closed"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (sender, mut rx) = channel();
        sender
            .send(Event::DocumentDeleted(Uuid::nil()))
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(Event::DocumentDeleted(Uuid::nil())));
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (sender, rx) = channel();
        drop(rx);
        sender.send_or_log(Event::SessionClosed(Uuid::nil())).await;
        assert!(sender.send(Event::SessionClosed(Uuid::nil())).await.is_err());
    }
}
