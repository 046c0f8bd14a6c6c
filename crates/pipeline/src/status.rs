//! Read-only status queries.

use serde::Serialize;
use thiserror::Error;

use clipforge_core::{EscalationId, GenerationRecord, GenerationStatus};

use crate::store::{RecordStore, StoreError};

/// Client-facing view of a record's generation state.
///
/// Carries only what the invariants allow: a URL iff completed, an error
/// string iff failed. The stored `last_error` is already the short
/// normalized reason, never provider-internal diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&GenerationRecord> for StatusView {
    fn from(record: &GenerationRecord) -> Self {
        Self {
            status: record.status,
            result_url: record.result_url.clone(),
            error: record.last_error.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("no generation record for {0}")]
    NotFound(EscalationId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Thin read path for authenticated clients.
///
/// Never mutates, never calls the provider: progress happens only in
/// sweeps. Authorization is the caller's concern.
pub struct StatusReporter<S> {
    store: S,
}

impl<S: RecordStore> StatusReporter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get_status(&self, id: EscalationId) -> Result<StatusView, StatusError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or(StatusError::NotFound(id))?;
        Ok(StatusView::from(&record))
    }
}
