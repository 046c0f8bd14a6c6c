//! Postgres-backed record store.
//!
//! Persists generation records in the `generation_records` table
//! (`schema.sql`) and implements the conditional-transition contract with a
//! single `UPDATE … WHERE id = $1 AND status = $2` per transition
//! (`Released` additionally conditions on `updated_at`): `rows_affected`
//! *is* the condition result, so no transaction or lock layer is needed.
//!
//! ## Error Mapping
//!
//! Every SQLx failure maps to `StoreError::Storage` (retryable): the sweep
//! skips the affected record, or aborts if the failure hit a discovery
//! query. The one exception is a conditional update that matched zero rows
//! because the record does not exist at all, which maps to
//! `StoreError::NotFound`.
//!
//! ## Thread Safety
//!
//! `PostgresRecordStore` is `Send + Sync`; all operations go through the
//! SQLx connection pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use clipforge_core::{
    EscalationId, GenerationRecord, GenerationStatus, ProviderJobId, Transition,
};
use clipforge_pipeline::{RecordStore, StoreError};

/// `RecordStore` backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: Arc<PgPool>,
}

const SELECT_COLUMNS: &str = "id, title, script, status, provider_job_id, \
     result_url, last_error, submitted_at, completed_at, created_at, updated_at";

impl PostgresRecordStore {
    /// Create a store on top of an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn map_sqlx_error(operation: &str, error: sqlx::Error) -> StoreError {
    StoreError::Storage(format!("{operation}: {error}"))
}

fn map_row(row: &PgRow) -> Result<GenerationRecord, StoreError> {
    let corrupt = |e: String| StoreError::Storage(format!("corrupt row: {e}"));

    let status: String = row
        .try_get("status")
        .map_err(|e| map_sqlx_error("read status", e))?;
    let status: GenerationStatus = status.parse().map_err(|e: clipforge_core::DomainError| {
        corrupt(e.to_string())
    })?;

    let provider_job_id: Option<String> = row
        .try_get("provider_job_id")
        .map_err(|e| map_sqlx_error("read provider_job_id", e))?;
    let provider_job_id = provider_job_id
        .map(ProviderJobId::new)
        .transpose()
        .map_err(|e| corrupt(e.to_string()))?;

    Ok(GenerationRecord {
        id: EscalationId::from_uuid(
            row.try_get("id").map_err(|e| map_sqlx_error("read id", e))?,
        ),
        title: row
            .try_get("title")
            .map_err(|e| map_sqlx_error("read title", e))?,
        script: row
            .try_get("script")
            .map_err(|e| map_sqlx_error("read script", e))?,
        status,
        provider_job_id,
        result_url: row
            .try_get("result_url")
            .map_err(|e| map_sqlx_error("read result_url", e))?,
        last_error: row
            .try_get("last_error")
            .map_err(|e| map_sqlx_error("read last_error", e))?,
        submitted_at: row
            .try_get("submitted_at")
            .map_err(|e| map_sqlx_error("read submitted_at", e))?,
        completed_at: row
            .try_get("completed_at")
            .map_err(|e| map_sqlx_error("read completed_at", e))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("read created_at", e))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| map_sqlx_error("read updated_at", e))?,
    })
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    #[instrument(skip(self, record), fields(id = %record.id), err)]
    async fn insert(&self, record: GenerationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO generation_records
                (id, title, script, status, provider_job_id, result_url,
                 last_error, submitted_at, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.title)
        .bind(&record.script)
        .bind(record.status.as_str())
        .bind(record.provider_job_id.as_ref().map(|j| j.as_str()))
        .bind(&record.result_url)
        .bind(&record.last_error)
        .bind(record.submitted_at)
        .bind(record.completed_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn get(&self, id: EscalationId) -> Result<Option<GenerationRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM generation_records WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(map_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_not_submitted(
        &self,
        limit: usize,
        now: DateTime<Utc>,
        claim_ttl: Duration,
    ) -> Result<Vec<GenerationRecord>, StoreError> {
        let stale_before = now - claim_ttl;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM generation_records
            WHERE status = 'not_requested'
               OR (status = 'pending'
                   AND provider_job_id IS NULL
                   AND updated_at <= $1)
            ORDER BY created_at ASC
            LIMIT $2
            "#
        ))
        .bind(stale_before)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_not_submitted", e))?;

        rows.iter().map(map_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn find_in_flight(&self, limit: usize) -> Result<Vec<GenerationRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM generation_records
            WHERE status = 'processing'
            ORDER BY submitted_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_in_flight", e))?;

        rows.iter().map(map_row).collect()
    }

    #[instrument(skip(self, transition), fields(id = %id, expected = %expected), err)]
    async fn try_transition(
        &self,
        id: EscalationId,
        expected: GenerationStatus,
        transition: Transition,
    ) -> Result<bool, StoreError> {
        if !transition.is_valid_from(expected) {
            return Err(StoreError::Storage(format!(
                "illegal transition {:?} from {}",
                transition, expected
            )));
        }

        let result = match &transition {
            Transition::Claimed { at } => {
                sqlx::query(
                    "UPDATE generation_records
                     SET status = 'pending', updated_at = $3
                     WHERE id = $1 AND status = $2",
                )
                .bind(id.as_uuid())
                .bind(expected.as_str())
                .bind(at)
                .execute(&*self.pool)
                .await
            }
            Transition::Submitted {
                provider_job_id,
                at,
            } => {
                sqlx::query(
                    "UPDATE generation_records
                     SET status = 'processing', provider_job_id = $3,
                         submitted_at = $4, updated_at = $4
                     WHERE id = $1 AND status = $2",
                )
                .bind(id.as_uuid())
                .bind(expected.as_str())
                .bind(provider_job_id.as_str())
                .bind(at)
                .execute(&*self.pool)
                .await
            }
            Transition::Released { claimed_at } => {
                // The extra updated_at condition is the release's
                // precondition: a claim refreshed since the caller's read
                // must not be stripped.
                sqlx::query(
                    "UPDATE generation_records
                     SET status = 'not_requested'
                     WHERE id = $1 AND status = $2 AND updated_at = $3",
                )
                .bind(id.as_uuid())
                .bind(expected.as_str())
                .bind(claimed_at)
                .execute(&*self.pool)
                .await
            }
            Transition::Completed { result_url, at } => {
                sqlx::query(
                    "UPDATE generation_records
                     SET status = 'completed', result_url = $3,
                         completed_at = $4, updated_at = $4
                     WHERE id = $1 AND status = $2",
                )
                .bind(id.as_uuid())
                .bind(expected.as_str())
                .bind(result_url)
                .bind(at)
                .execute(&*self.pool)
                .await
            }
            Transition::Failed { reason, at } => {
                sqlx::query(
                    "UPDATE generation_records
                     SET status = 'failed', last_error = $3, updated_at = $4
                     WHERE id = $1 AND status = $2",
                )
                .bind(id.as_uuid())
                .bind(expected.as_str())
                .bind(reason)
                .bind(at)
                .execute(&*self.pool)
                .await
            }
        };

        let result = result.map_err(|e| map_sqlx_error("try_transition", e))?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Zero rows: either the condition failed (a concurrent sweep won) or
        // the record does not exist. Distinguish so callers see the same
        // contract as the in-memory store.
        let exists = sqlx::query("SELECT 1 FROM generation_records WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("try_transition", e))?;

        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id)),
        }
    }
}
