//! Provider client contract and normalized outcomes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use clipforge_core::ProviderJobId;

use crate::request::GenerationRequest;

/// Normalized status of a submitted provider job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RenderStatus {
    /// The provider is still rendering; poll again on a later sweep.
    StillRunning,
    /// Rendering finished; `result_url` is an absolute URL clients can play.
    Succeeded { result_url: String },
    /// The provider accepted the job but rendering failed (terminal).
    Failed { reason: String },
}

/// Submission failure, split by whether a later sweep should try again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// Transient transport/provider trouble (network, timeout, 5xx, 429).
    /// The record is left untouched and re-submitted on a future sweep.
    #[error("retryable submission error: {0}")]
    Retryable(String),

    /// The provider rejected the request as malformed or unsupported (4xx).
    /// Terminal: there is no point re-sending the same payload.
    #[error("fatal submission error: {0}")]
    Fatal(String),
}

/// Poll failure. Always transient from the pipeline's point of view: a poll
/// that cannot be completed simply leaves the record in flight.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("retryable poll error: {0}")]
    Retryable(String),
}

/// Client for the remote generative-video service.
///
/// One remote call per method invocation; no internal retries. Both calls
/// are bounded by the transport's own timeouts, which keeps them inside the
/// sweep's wall-clock ceiling.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Submit a generation request; returns the provider's job id.
    async fn submit(&self, request: &GenerationRequest) -> Result<ProviderJobId, SubmitError>;

    /// Query the status of a previously submitted job.
    async fn poll(&self, job_id: &ProviderJobId) -> Result<RenderStatus, PollError>;
}
