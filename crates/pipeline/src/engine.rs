//! Job lifecycle engine.
//!
//! Decides, for one record at a time, whether to submit, poll, finalize, or
//! skip. Each pass is a single provider call plus a single conditional
//! write, so a pass that loses a race (or a sweep that stops between
//! records) can never leave a record half-written.

use tracing::{debug, warn};

use clipforge_core::{GenerationRecord, GenerationStatus, Transition};
use clipforge_provider::{
    GenerationRequest, PollError, RenderStatus, SubmitError, VideoProvider,
};

use crate::clock::Clock;
use crate::store::{RecordStore, StoreError};

/// Outcome of one submission pass over a discovery-bucket record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Provider accepted the job; record is now `Processing`.
    Submitted,
    /// Fatal provider rejection; record is now `Failed`.
    Rejected,
    /// Transient trouble (claim lost, retryable submit error, store error on
    /// a non-claim write); the record stays eligible for a future sweep.
    Deferred,
}

/// Outcome of one poll pass over an in-flight record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Provider still rendering; nothing written.
    StillRunning,
    /// Record transitioned to `Completed`.
    Completed,
    /// Record transitioned to `Failed`.
    Failed,
    /// Poll failed transiently, a concurrent sweep finalized first, or the
    /// record was inconsistent; nothing counted.
    Skipped,
}

/// The two-phase state machine over a store, a provider, and a clock.
///
/// Pure function of its dependencies: no global state, no retained memory
/// between passes.
pub struct LifecycleEngine<S, P, C> {
    store: S,
    provider: P,
    clock: C,
}

impl<S, P, C> LifecycleEngine<S, P, C>
where
    S: RecordStore,
    P: VideoProvider,
    C: Clock,
{
    pub fn new(store: S, provider: P, clock: C) -> Self {
        Self {
            store,
            provider,
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Claim a discovery-bucket record and submit it to the provider.
    ///
    /// The claim (`-> Pending`) happens before the remote call: whichever
    /// sweep wins the conditional write is the only one that submits, which
    /// is what bounds `submit` to at most one call per live claim.
    ///
    /// A stale claim is handed back through `Released` first. The release is
    /// conditioned on the claim timestamp as read at discovery, so of any
    /// number of sweeps that rediscovered the same stale claim, exactly one
    /// wins the release, and only that one proceeds to re-claim.
    pub async fn submit_pass(&self, record: &GenerationRecord) -> Result<SubmitOutcome, StoreError> {
        if record.status == GenerationStatus::Pending {
            let released = self
                .store
                .try_transition(
                    record.id,
                    GenerationStatus::Pending,
                    Transition::Released {
                        claimed_at: record.updated_at,
                    },
                )
                .await?;
            if !released {
                debug!(id = %record.id, "stale claim recovered by a concurrent sweep");
                return Ok(SubmitOutcome::Deferred);
            }
        }

        let now = self.clock.now();
        let claimed = self
            .store
            .try_transition(
                record.id,
                GenerationStatus::NotRequested,
                Transition::Claimed { at: now },
            )
            .await?;
        if !claimed {
            debug!(id = %record.id, "claim lost to a concurrent sweep");
            return Ok(SubmitOutcome::Deferred);
        }

        let request = match GenerationRequest::new(record.id, &record.title, &record.script) {
            Ok(request) => request,
            Err(e) => {
                // Content that can never form a valid request is a terminal
                // condition, same as a provider-side rejection.
                return self.fail_claimed(record, e.to_string()).await;
            }
        };

        match self.provider.submit(&request).await {
            Ok(provider_job_id) => {
                let at = self.clock.now();
                let won = self
                    .store
                    .try_transition(
                        record.id,
                        GenerationStatus::Pending,
                        Transition::Submitted {
                            provider_job_id: provider_job_id.clone(),
                            at,
                        },
                    )
                    .await?;
                if won {
                    debug!(id = %record.id, job_id = %provider_job_id, "render submitted");
                    Ok(SubmitOutcome::Submitted)
                } else {
                    // Claim expired mid-submit and someone else took over.
                    // The provider job we created is orphaned; dedup happens
                    // by record, so it is simply never polled.
                    warn!(id = %record.id, job_id = %provider_job_id, "submission write lost");
                    Ok(SubmitOutcome::Deferred)
                }
            }
            Err(SubmitError::Fatal(reason)) => self.fail_claimed(record, reason).await,
            Err(SubmitError::Retryable(reason)) => {
                warn!(id = %record.id, reason = %reason, "submission deferred");
                self.store
                    .try_transition(
                        record.id,
                        GenerationStatus::Pending,
                        Transition::Released { claimed_at: now },
                    )
                    .await?;
                Ok(SubmitOutcome::Deferred)
            }
        }
    }

    async fn fail_claimed(
        &self,
        record: &GenerationRecord,
        reason: String,
    ) -> Result<SubmitOutcome, StoreError> {
        warn!(id = %record.id, reason = %reason, "submission rejected");
        let won = self
            .store
            .try_transition(
                record.id,
                GenerationStatus::Pending,
                Transition::Failed {
                    reason,
                    at: self.clock.now(),
                },
            )
            .await?;
        Ok(if won {
            SubmitOutcome::Rejected
        } else {
            SubmitOutcome::Deferred
        })
    }

    /// Poll one in-flight record and reconcile the provider's answer.
    pub async fn poll_pass(&self, record: &GenerationRecord) -> Result<PollOutcome, StoreError> {
        let Some(job_id) = record.provider_job_id.as_ref() else {
            // Processing without a job id violates the record invariants;
            // leave it alone and make noise.
            warn!(id = %record.id, "in-flight record has no provider job id");
            return Ok(PollOutcome::Skipped);
        };

        match self.provider.poll(job_id).await {
            Ok(RenderStatus::StillRunning) => {
                debug!(id = %record.id, job_id = %job_id, "render still running");
                Ok(PollOutcome::StillRunning)
            }
            Ok(RenderStatus::Succeeded { result_url }) => {
                let won = self
                    .store
                    .try_transition(
                        record.id,
                        GenerationStatus::Processing,
                        Transition::Completed {
                            result_url,
                            at: self.clock.now(),
                        },
                    )
                    .await?;
                Ok(if won {
                    PollOutcome::Completed
                } else {
                    PollOutcome::Skipped
                })
            }
            Ok(RenderStatus::Failed { reason }) => {
                let won = self
                    .store
                    .try_transition(
                        record.id,
                        GenerationStatus::Processing,
                        Transition::Failed {
                            reason,
                            at: self.clock.now(),
                        },
                    )
                    .await?;
                Ok(if won {
                    PollOutcome::Failed
                } else {
                    PollOutcome::Skipped
                })
            }
            Err(PollError::Retryable(reason)) => {
                warn!(id = %record.id, job_id = %job_id, reason = %reason, "poll deferred");
                Ok(PollOutcome::Skipped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::store::InMemoryRecordStore;
    use crate::testutil::{FakeProvider, ProviderScript};
    use chrono::Utc;
    use clipforge_core::EscalationId;
    use std::sync::Arc;

    async fn seeded(store: &Arc<InMemoryRecordStore>) -> GenerationRecord {
        let rec = GenerationRecord::new(
            EscalationId::new(),
            "Fractions",
            "Why denominators matter",
            Utc::now(),
        );
        store.insert(rec.clone()).await.unwrap();
        rec
    }

    #[tokio::test]
    async fn submit_pass_moves_record_to_processing() {
        let store = InMemoryRecordStore::arc();
        let rec = seeded(&store).await;
        let provider = FakeProvider::new(ProviderScript::submit_ok("prov-1"));
        let engine = LifecycleEngine::new(store.clone(), provider, SystemClock);

        let outcome = engine.submit_pass(&rec).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);

        let stored = store.get(rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Processing);
        assert_eq!(stored.provider_job_id.unwrap().as_str(), "prov-1");
        assert!(stored.submitted_at.is_some());
    }

    #[tokio::test]
    async fn fatal_submission_fails_record_without_retry() {
        let store = InMemoryRecordStore::arc();
        let rec = seeded(&store).await;
        let provider = FakeProvider::new(ProviderScript::submit_fatal("bad payload"));
        let engine = LifecycleEngine::new(store.clone(), provider, SystemClock);

        let outcome = engine.submit_pass(&rec).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Rejected);

        let stored = store.get(rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("bad payload"));
    }

    #[tokio::test]
    async fn retryable_submission_releases_the_claim() {
        let store = InMemoryRecordStore::arc();
        let rec = seeded(&store).await;
        let provider = FakeProvider::new(ProviderScript::submit_retryable("connect timeout"));
        let engine = LifecycleEngine::new(store.clone(), provider, SystemClock);

        let outcome = engine.submit_pass(&rec).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Deferred);

        // Untouched as far as discovery is concerned: eligible next sweep.
        let stored = store.get(rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::NotRequested);
        assert!(stored.provider_job_id.is_none());
        assert!(stored.last_error.is_none());
    }

    #[tokio::test]
    async fn lost_claim_defers_without_calling_submit() {
        let store = InMemoryRecordStore::arc();
        let rec = seeded(&store).await;

        // Another sweep claims the record between discovery and our pass.
        store
            .try_transition(
                rec.id,
                GenerationStatus::NotRequested,
                Transition::Claimed { at: Utc::now() },
            )
            .await
            .unwrap();

        let provider = FakeProvider::new(ProviderScript::submit_ok("prov-x"));
        let engine = LifecycleEngine::new(store.clone(), provider, SystemClock);

        let outcome = engine.submit_pass(&rec).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Deferred);
        assert_eq!(engine.provider().submit_calls(), 0);
    }

    #[tokio::test]
    async fn stale_claim_is_resubmitted_by_exactly_one_pass() {
        let store = InMemoryRecordStore::arc();
        let rec = seeded(&store).await;

        // A sweep claimed the record and died before submitting.
        store
            .try_transition(
                rec.id,
                GenerationStatus::NotRequested,
                Transition::Claimed { at: Utc::now() },
            )
            .await
            .unwrap();
        let stale = store.get(rec.id).await.unwrap().unwrap();

        let provider = FakeProvider::new(ProviderScript::submit_ok("prov-1"));
        let a = LifecycleEngine::new(store.clone(), provider.clone(), SystemClock);
        let b = LifecycleEngine::new(store.clone(), provider.clone(), SystemClock);

        // Both passes hold the same stale read. FakeProvider panics on a
        // second submit for one record, so the join completing is itself
        // part of the assertion.
        let (ra, rb) = tokio::join!(a.submit_pass(&stale), b.submit_pass(&stale));
        let outcomes = [ra.unwrap(), rb.unwrap()];

        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == SubmitOutcome::Submitted)
                .count(),
            1
        );
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == SubmitOutcome::Deferred)
                .count(),
            1
        );
        assert_eq!(provider.submit_calls(), 1);

        let stored = store.get(rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Processing);
    }

    #[tokio::test]
    async fn poll_pass_still_running_changes_nothing() {
        let store = InMemoryRecordStore::arc();
        let rec = seeded(&store).await;
        let provider = FakeProvider::new(
            ProviderScript::submit_ok("prov-1").then_poll_running(3),
        );
        let clock = ManualClock::new(Utc::now());
        let engine = LifecycleEngine::new(store.clone(), provider, clock);

        engine.submit_pass(&rec).await.unwrap();
        let in_flight = store.get(rec.id).await.unwrap().unwrap();
        let before = in_flight.clone();

        for _ in 0..3 {
            let outcome = engine.poll_pass(&in_flight).await.unwrap();
            assert_eq!(outcome, PollOutcome::StillRunning);
        }

        // Idempotent: N still-running polls leave the stored state bitwise
        // identical.
        let after = store.get(rec.id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn poll_pass_success_completes_record() {
        let store = InMemoryRecordStore::arc();
        let rec = seeded(&store).await;
        let provider = FakeProvider::new(
            ProviderScript::submit_ok("prov-1")
                .then_poll_succeed("https://cdn.example/videos/f1.mp4"),
        );
        let engine = LifecycleEngine::new(store.clone(), provider, SystemClock);

        engine.submit_pass(&rec).await.unwrap();
        let in_flight = store.get(rec.id).await.unwrap().unwrap();

        let outcome = engine.poll_pass(&in_flight).await.unwrap();
        assert_eq!(outcome, PollOutcome::Completed);

        let stored = store.get(rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Completed);
        assert_eq!(
            stored.result_url.as_deref(),
            Some("https://cdn.example/videos/f1.mp4")
        );
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn poll_pass_provider_failure_fails_record() {
        let store = InMemoryRecordStore::arc();
        let rec = seeded(&store).await;
        let provider = FakeProvider::new(
            ProviderScript::submit_ok("prov-1").then_poll_fail("render crashed"),
        );
        let engine = LifecycleEngine::new(store.clone(), provider, SystemClock);

        engine.submit_pass(&rec).await.unwrap();
        let in_flight = store.get(rec.id).await.unwrap().unwrap();

        let outcome = engine.poll_pass(&in_flight).await.unwrap();
        assert_eq!(outcome, PollOutcome::Failed);

        let stored = store.get(rec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GenerationStatus::Failed);
        assert_eq!(stored.last_error.as_deref(), Some("render crashed"));
    }

    #[tokio::test]
    async fn losing_finalization_race_is_a_noop() {
        let store = InMemoryRecordStore::arc();
        let rec = seeded(&store).await;
        let provider = FakeProvider::new(
            ProviderScript::submit_ok("prov-1")
                .then_poll_succeed("https://cdn.example/videos/f1.mp4"),
        );
        let engine = LifecycleEngine::new(store.clone(), provider, SystemClock);

        engine.submit_pass(&rec).await.unwrap();
        let in_flight = store.get(rec.id).await.unwrap().unwrap();

        // A concurrent sweep finalizes first.
        store
            .try_transition(
                rec.id,
                GenerationStatus::Processing,
                Transition::Completed {
                    result_url: "https://cdn.example/videos/first.mp4".to_string(),
                    at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let outcome = engine.poll_pass(&in_flight).await.unwrap();
        assert_eq!(outcome, PollOutcome::Skipped);

        // The winner's result stands.
        let stored = store.get(rec.id).await.unwrap().unwrap();
        assert_eq!(
            stored.result_url.as_deref(),
            Some("https://cdn.example/videos/first.mp4")
        );
    }
}
