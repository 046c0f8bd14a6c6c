//! Generation record and its state machine.
//!
//! One `GenerationRecord` exists per escalation eligible for video
//! generation. The record store owns the canonical state; the pipeline only
//! proposes `Transition`s, which the store applies conditionally. Modeling
//! the transitions as a closed tagged variant keeps invalid combinations
//! (e.g. a result URL on a still-processing record) unrepresentable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{EscalationId, ProviderJobId};

/// Lifecycle status of a generation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// No provider job has been requested yet.
    NotRequested,
    /// Claimed by a sweep for submission; no provider job exists yet.
    Pending,
    /// A provider job is in flight.
    Processing,
    /// The provider delivered a rendered video (terminal).
    Completed,
    /// Submission was rejected or the provider job failed (terminal).
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::NotRequested => "not_requested",
            GenerationStatus::Pending => "pending",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }
}

impl core::str::FromStr for GenerationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_requested" => Ok(GenerationStatus::NotRequested),
            "pending" => Ok(GenerationStatus::Pending),
            "processing" => Ok(GenerationStatus::Processing),
            "completed" => Ok(GenerationStatus::Completed),
            "failed" => Ok(GenerationStatus::Failed),
            other => Err(DomainError::validation(format!(
                "unknown generation status: {other}"
            ))),
        }
    }
}

impl core::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable per-escalation generation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Stable identifier, owned by the record store.
    pub id: EscalationId,
    /// Escalation subject line, snapshotted when the record was created.
    pub title: String,
    /// Narration/script content the video is generated from.
    pub script: String,
    /// Current lifecycle status.
    pub status: GenerationStatus,
    /// Provider-assigned job id; absent until submitted, immutable once set.
    pub provider_job_id: Option<ProviderJobId>,
    /// Absolute URL of the rendered video; set iff `Completed`.
    pub result_url: Option<String>,
    /// Short failure reason; set iff `Failed`.
    pub last_error: Option<String>,
    /// When the provider job was submitted.
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the record reached `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationRecord {
    /// Create a fresh, not-yet-requested record.
    pub fn new(
        id: EscalationId,
        title: impl Into<String>,
        script: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            script: script.into(),
            status: GenerationStatus::NotRequested,
            provider_job_id: None,
            result_url: None,
            last_error: None,
            submitted_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a sweep-held claim on this record has gone stale.
    ///
    /// A `Pending` record without a provider job id belongs to a sweep that
    /// claimed it and then died before submitting (or before releasing it).
    /// Once the claim is older than `ttl` the record becomes discoverable
    /// again.
    pub fn claim_is_stale(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        self.status == GenerationStatus::Pending
            && self.provider_job_id.is_none()
            && now - self.updated_at >= ttl
    }
}

/// A state change the pipeline proposes to the record store.
///
/// Each variant carries exactly the fields that become valid in the target
/// status, so applying a transition can never produce a record that violates
/// the status/field invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Transition {
    /// A sweep takes ownership of the record ahead of submission.
    Claimed { at: DateTime<Utc> },
    /// The provider accepted the request and assigned a job id.
    Submitted {
        provider_job_id: ProviderJobId,
        at: DateTime<Utc>,
    },
    /// Hand a claim back so the record becomes discoverable again, either
    /// after a transient submission error or when recovering a stale claim.
    /// `claimed_at` is the claim's `updated_at` as previously read; the
    /// store honors the release only while that still matches, so a release
    /// can never strip a claim that was refreshed in between.
    Released { claimed_at: DateTime<Utc> },
    /// The provider job finished and produced a video.
    Completed {
        result_url: String,
        at: DateTime<Utc>,
    },
    /// Submission was rejected outright, or the provider job failed.
    Failed { reason: String, at: DateTime<Utc> },
}

impl Transition {
    /// The status a record lands in after this transition.
    pub fn target_status(&self) -> GenerationStatus {
        match self {
            Transition::Claimed { .. } => GenerationStatus::Pending,
            Transition::Submitted { .. } => GenerationStatus::Processing,
            Transition::Released { .. } => GenerationStatus::NotRequested,
            Transition::Completed { .. } => GenerationStatus::Completed,
            Transition::Failed { .. } => GenerationStatus::Failed,
        }
    }

    /// Whether this transition is legal from `from`.
    ///
    /// Encodes the lifecycle paths: `NotRequested -> Pending -> Processing ->
    /// {Completed | Failed}`, with `Pending -> NotRequested` as the release
    /// path. A stale claim is never re-claimed in place; it goes back
    /// through `Released` first so the status change gives the conditional
    /// write something to arbitrate. Terminal states accept nothing.
    pub fn is_valid_from(&self, from: GenerationStatus) -> bool {
        if from.is_terminal() {
            return false;
        }
        match self {
            Transition::Claimed { .. } => from == GenerationStatus::NotRequested,
            Transition::Submitted { .. } => from == GenerationStatus::Pending,
            Transition::Released { .. } => from == GenerationStatus::Pending,
            Transition::Completed { .. } => from == GenerationStatus::Processing,
            Transition::Failed { .. } => {
                // Fatal submission errors fail a claimed record; provider-
                // reported failures fail an in-flight one.
                from == GenerationStatus::Pending || from == GenerationStatus::Processing
            }
        }
    }

    /// Extra condition, beyond the status match, that a store must verify
    /// under the same conditional write.
    ///
    /// Only `Released` carries one: it requires the claim timestamp to be
    /// unchanged since the caller read the record, so two sweeps that both
    /// rediscover one stale claim get exactly one winner.
    pub fn precondition_holds(&self, record: &GenerationRecord) -> bool {
        match self {
            Transition::Released { claimed_at } => record.updated_at == *claimed_at,
            _ => true,
        }
    }

    /// Apply this transition to `record`, enforcing lifecycle legality.
    ///
    /// Pure domain logic: store implementations call this after their own
    /// conditional checks (status match plus [`Self::precondition_holds`])
    /// have succeeded.
    pub fn apply(&self, record: &mut GenerationRecord) -> DomainResult<()> {
        if !self.is_valid_from(record.status) {
            return Err(DomainError::invalid_transition(format!(
                "{:?} not allowed from {}",
                self, record.status
            )));
        }

        match self {
            Transition::Claimed { at } => {
                record.status = GenerationStatus::Pending;
                record.updated_at = *at;
            }
            Transition::Submitted {
                provider_job_id,
                at,
            } => {
                record.status = GenerationStatus::Processing;
                record.provider_job_id = Some(provider_job_id.clone());
                record.submitted_at = Some(*at);
                record.updated_at = *at;
            }
            Transition::Released { .. } => {
                record.status = GenerationStatus::NotRequested;
                // updated_at deliberately kept at the claim time; it is the
                // token the release was conditioned on.
            }
            Transition::Completed { result_url, at } => {
                record.status = GenerationStatus::Completed;
                record.result_url = Some(result_url.clone());
                record.completed_at = Some(*at);
                record.updated_at = *at;
            }
            Transition::Failed { reason, at } => {
                record.status = GenerationStatus::Failed;
                record.last_error = Some(reason.clone());
                record.updated_at = *at;
            }
        }
        Ok(())
    }
}
