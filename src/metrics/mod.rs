/*!
 * # Metrics Module
 *
 * Prometheus metrics for document writes and their transactions, exposed in
 * text format at `/metrics`.
 */

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref DOCUMENTS_CREATED: IntCounterVec = IntCounterVec::new(
        Opts::new("bizdesk_documents_created_total", "Documents created, by kind"),
        &["kind"]
    )
    .expect("metric can be created");
    pub static ref DOCUMENT_CREATION_FAILURES: IntCounter = IntCounter::new(
        "bizdesk_document_creation_failures_total",
        "Document creations that failed or were rolled back"
    )
    .expect("metric can be created");
    pub static ref TRANSACTIONS_COMMITTED: IntCounterVec = IntCounterVec::new(
        Opts::new("bizdesk_db_transactions_committed_total", "Committed transactions"),
        &["operation"]
    )
    .expect("metric can be created");
    pub static ref TRANSACTIONS_ROLLED_BACK: IntCounterVec = IntCounterVec::new(
        Opts::new("bizdesk_db_transactions_rolled_back_total", "Rolled back transactions"),
        &["operation"]
    )
    .expect("metric can be created");
    pub static ref SESSIONS_OPENED: IntCounter = IntCounter::new(
        "bizdesk_sessions_opened_total",
        "Successful logins"
    )
    .expect("metric can be created");
    pub static ref LOGIN_FAILURES: IntCounter = IntCounter::new(
        "bizdesk_login_failures_total",
        "Rejected login attempts"
    )
    .expect("metric can be created");
}

/// Registers every collector exactly once; later calls are no-ops.
pub fn register_metrics() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(DOCUMENTS_CREATED.clone()),
            Box::new(DOCUMENT_CREATION_FAILURES.clone()),
            Box::new(TRANSACTIONS_COMMITTED.clone()),
            Box::new(TRANSACTIONS_ROLLED_BACK.clone()),
            Box::new(SESSIONS_OPENED.clone()),
            Box::new(LOGIN_FAILURES.clone()),
        ];
        for collector in collectors {
            if let Err(err) = REGISTRY.register(collector) {
                tracing::warn!(error = %err, "metric registration failed");
            }
        }
    });
}

pub async fn metrics_handler() -> Result<String, MetricsError> {
    register_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exports_registered_counters() {
        DOCUMENTS_CREATED.with_label_values(&["Invoice"]).inc();
        TRANSACTIONS_COMMITTED
            .with_label_values(&["create_document"])
            .inc();

        let body = metrics_handler().await.unwrap();
        assert!(body.contains("bizdesk_documents_created_total"));
        assert!(body.contains("bizdesk_db_transactions_committed_total"));
    }

    #[test]
    fn registration_is_idempotent() {
        register_metrics();
        register_metrics();
    }
}
