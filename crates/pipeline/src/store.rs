//! Record store boundary and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use clipforge_core::{EscalationId, GenerationRecord, GenerationStatus, Transition};

/// Record store failure.
///
/// Every variant is retryable from the sweep's point of view: the affected
/// record is skipped this sweep and rediscovered on the next one. Only the
/// orchestrator treats a failed *discovery query* as fatal for the sweep.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(EscalationId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Persistence boundary for generation records.
///
/// `try_transition` is the sole mutation entry point. It writes only if the
/// record's current status still equals `expected`, which is what prevents
/// double submission and double finalization under overlapping sweeps.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a fresh record (created by the surrounding system when an
    /// escalation becomes eligible for video generation).
    async fn insert(&self, record: GenerationRecord) -> Result<(), StoreError>;

    /// Fetch a single record.
    async fn get(&self, id: EscalationId) -> Result<Option<GenerationRecord>, StoreError>;

    /// Records awaiting submission, oldest first: `NotRequested`, plus
    /// `Pending` claims without a provider job whose claim is older than
    /// `claim_ttl` (a sweep died holding them).
    async fn find_not_submitted(
        &self,
        limit: usize,
        now: DateTime<Utc>,
        claim_ttl: Duration,
    ) -> Result<Vec<GenerationRecord>, StoreError>;

    /// Records with a provider job in flight (`Processing`), oldest
    /// submission first.
    async fn find_in_flight(&self, limit: usize) -> Result<Vec<GenerationRecord>, StoreError>;

    /// Conditionally apply `transition` if the record's status still equals
    /// `expected` and `transition.precondition_holds` for the stored record.
    /// Returns whether the write took effect; `false` means a concurrent
    /// sweep got there first.
    async fn try_transition(
        &self,
        id: EscalationId,
        expected: GenerationStatus,
        transition: Transition,
    ) -> Result<bool, StoreError>;
}

/// In-memory record store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<EscalationId, GenerationRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: GenerationRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: EscalationId) -> Result<Option<GenerationRecord>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records.get(&id).cloned())
    }

    async fn find_not_submitted(
        &self,
        limit: usize,
        now: DateTime<Utc>,
        claim_ttl: Duration,
    ) -> Result<Vec<GenerationRecord>, StoreError> {
        let records = self.records.read().unwrap();
        let mut result: Vec<_> = records
            .values()
            .filter(|r| {
                r.status == GenerationStatus::NotRequested || r.claim_is_stale(now, claim_ttl)
            })
            .cloned()
            .collect();

        result.sort_by_key(|r| r.created_at);
        result.truncate(limit);
        Ok(result)
    }

    async fn find_in_flight(&self, limit: usize) -> Result<Vec<GenerationRecord>, StoreError> {
        let records = self.records.read().unwrap();
        let mut result: Vec<_> = records
            .values()
            .filter(|r| r.status == GenerationStatus::Processing)
            .cloned()
            .collect();

        result.sort_by_key(|r| r.submitted_at);
        result.truncate(limit);
        Ok(result)
    }

    async fn try_transition(
        &self,
        id: EscalationId,
        expected: GenerationStatus,
        transition: Transition,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().unwrap();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if record.status != expected || !transition.precondition_holds(record) {
            return Ok(false);
        }

        // Condition held; an illegal transition from here is a pipeline bug,
        // surfaced as a storage error rather than silently dropped.
        transition
            .apply(record)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(true)
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn insert(&self, record: GenerationRecord) -> Result<(), StoreError> {
        (**self).insert(record).await
    }

    async fn get(&self, id: EscalationId) -> Result<Option<GenerationRecord>, StoreError> {
        (**self).get(id).await
    }

    async fn find_not_submitted(
        &self,
        limit: usize,
        now: DateTime<Utc>,
        claim_ttl: Duration,
    ) -> Result<Vec<GenerationRecord>, StoreError> {
        (**self).find_not_submitted(limit, now, claim_ttl).await
    }

    async fn find_in_flight(&self, limit: usize) -> Result<Vec<GenerationRecord>, StoreError> {
        (**self).find_in_flight(limit).await
    }

    async fn try_transition(
        &self,
        id: EscalationId,
        expected: GenerationStatus,
        transition: Transition,
    ) -> Result<bool, StoreError> {
        (**self).try_transition(id, expected, transition).await
    }
}
