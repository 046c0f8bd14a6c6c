//! Poll orchestrator.
//!
//! `run_sweep` is the single externally invoked operation: discover
//! candidates in both buckets, run each through the lifecycle engine,
//! aggregate counters. Safe to call repeatedly and concurrently; cadence is
//! the external scheduler's business.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::SweepConfig;
use crate::engine::{LifecycleEngine, PollOutcome, SubmitOutcome};
use clipforge_provider::VideoProvider;
use crate::store::{RecordStore, StoreError};

/// Aggregate counters for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Provider jobs created this sweep.
    pub created: u64,
    /// In-flight jobs polled and found still running.
    pub polled: u64,
    /// Records that reached `Completed`.
    pub completed: u64,
    /// Records that reached `Failed` (fatal submission or provider failure).
    pub failed: u64,
    /// Records skipped: lost races, transient provider/store trouble.
    pub skipped: u64,
    /// Whether the wall-clock ceiling cut the sweep short.
    pub budget_exhausted: bool,
    /// Wall-clock time the sweep ran for.
    pub elapsed_ms: u64,
}

/// Whole-sweep infrastructure failure: a discovery query could not be run.
///
/// Carries whatever counts were accumulated before the store went away;
/// every record is still in its last durable state.
#[derive(Debug, thiserror::Error)]
#[error("sweep aborted: {source}")]
pub struct SweepError {
    #[source]
    pub source: StoreError,
    pub partial: SweepReport,
}

/// Runs one full discover-process-aggregate cycle per invocation.
///
/// A pure function of its dependencies (store, provider, clock, config): no
/// global state, nothing retained between invocations, so any scheduler can
/// drive it.
pub struct SweepRunner<S, P, C> {
    store: S,
    engine: LifecycleEngine<S, P, C>,
    config: SweepConfig,
}

impl<S, P, C> SweepRunner<S, P, C>
where
    S: RecordStore + Clone,
    P: VideoProvider,
    C: Clock,
{
    pub fn new(store: S, provider: P, clock: C, config: SweepConfig) -> Self {
        let engine = LifecycleEngine::new(store.clone(), provider, clock);
        Self {
            store,
            engine,
            config,
        }
    }

    /// Run one sweep: submissions first (bounds the provider submission rate
    /// ahead of polling), then polls, stopping early if the ceiling hits.
    pub async fn run_sweep(&self) -> Result<SweepReport, SweepError> {
        let started = self.engine.clock().now();
        let mut report = SweepReport::default();
        let mut just_submitted = HashSet::new();

        let candidates = self
            .store
            .find_not_submitted(self.config.batch_limit, started, self.config.claim_ttl)
            .await
            .map_err(|source| self.abort(source, report.clone(), started))?;

        for record in candidates {
            if self.over_budget(started) {
                report.budget_exhausted = true;
                break;
            }
            match self.engine.submit_pass(&record).await {
                Ok(SubmitOutcome::Submitted) => {
                    report.created += 1;
                    just_submitted.insert(record.id);
                }
                Ok(SubmitOutcome::Rejected) => report.failed += 1,
                Ok(SubmitOutcome::Deferred) => report.skipped += 1,
                Err(e) => {
                    warn!(id = %record.id, error = %e, "record skipped on store error");
                    report.skipped += 1;
                }
            }
        }

        let in_flight = if report.budget_exhausted {
            Vec::new()
        } else {
            self.store
                .find_in_flight(self.config.batch_limit)
                .await
                .map_err(|source| self.abort(source, report.clone(), started))?
        };

        for record in in_flight {
            // A job submitted moments ago has nothing to report yet; its
            // first poll belongs to the next sweep.
            if just_submitted.contains(&record.id) {
                continue;
            }
            if self.over_budget(started) {
                report.budget_exhausted = true;
                break;
            }
            match self.engine.poll_pass(&record).await {
                Ok(PollOutcome::StillRunning) => report.polled += 1,
                Ok(PollOutcome::Completed) => report.completed += 1,
                Ok(PollOutcome::Failed) => report.failed += 1,
                Ok(PollOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(id = %record.id, error = %e, "record skipped on store error");
                    report.skipped += 1;
                }
            }
        }

        report.elapsed_ms = self.elapsed_ms(started);
        info!(
            created = report.created,
            polled = report.polled,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            budget_exhausted = report.budget_exhausted,
            elapsed_ms = report.elapsed_ms,
            "sweep finished"
        );
        Ok(report)
    }

    fn over_budget(&self, started: chrono::DateTime<chrono::Utc>) -> bool {
        self.engine.clock().now() - started >= self.config.ceiling
    }

    fn elapsed_ms(&self, started: chrono::DateTime<chrono::Utc>) -> u64 {
        (self.engine.clock().now() - started)
            .num_milliseconds()
            .max(0) as u64
    }

    fn abort(
        &self,
        source: StoreError,
        mut partial: SweepReport,
        started: chrono::DateTime<chrono::Utc>,
    ) -> SweepError {
        partial.elapsed_ms = self.elapsed_ms(started);
        SweepError { source, partial }
    }
}
