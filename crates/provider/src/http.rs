//! HTTP implementation of the provider client.
//!
//! Speaks the provider's REST surface (`POST /v1/renders`,
//! `GET /v1/renders/{id}`) and normalizes its payloads and failure modes
//! into the crate's typed vocabulary.
//!
//! ## Error classes
//!
//! | Condition                         | Mapped to                  |
//! |-----------------------------------|----------------------------|
//! | connect error / timeout           | retryable                  |
//! | 408, 429, any 5xx                 | retryable                  |
//! | any other 4xx on submit           | `SubmitError::Fatal`       |
//! | malformed / unrecognized payload  | fatal (submit), retryable (poll) |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use clipforge_core::ProviderJobId;

use crate::client::{PollError, RenderStatus, SubmitError, VideoProvider};
use crate::request::GenerationRequest;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the rendering provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Base URL, e.g. `https://render.example.com`.
    pub base_url: String,
    /// Bearer token for the provider API.
    pub api_key: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl HttpProviderConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Failure to build the HTTP client from a [`HttpProviderConfig`].
///
/// A wiring-time error, distinct from the submit/poll taxonomy: nothing was
/// sent to the provider yet.
#[derive(Debug, thiserror::Error)]
#[error("invalid provider configuration: {0}")]
pub struct ProviderConfigError(String);

/// `VideoProvider` backed by the provider's HTTP API.
pub struct HttpVideoProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl HttpVideoProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderConfigError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderConfigError(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn renders_url(&self) -> String {
        format!("{}/v1/renders", self.config.base_url.trim_end_matches('/'))
    }

    fn render_url(&self, job_id: &ProviderJobId) -> String {
        format!("{}/{}", self.renders_url(), job_id)
    }
}

// Wire shapes. Kept private: nothing outside this module should ever see
// provider vocabulary.

#[derive(Serialize)]
struct SubmitBody<'a> {
    client_ref: String,
    title: &'a str,
    script: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'a str>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn transport_class(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timeout: {error}")
    } else if error.is_connect() {
        format!("connection error: {error}")
    } else {
        format!("transport error: {error}")
    }
}

fn status_is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Require a well-formed absolute http(s) URL before storing it as a result.
fn validate_result_url(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw).map_err(|e| format!("provider returned invalid URL: {e}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!(
            "provider returned non-http result URL: {}",
            url.scheme()
        ));
    }
    Ok(url.to_string())
}

/// Normalize the provider's status string into [`RenderStatus`].
fn normalize_poll(body: PollResponse) -> Result<RenderStatus, PollError> {
    match body.status.as_str() {
        "queued" | "rendering" | "processing" => Ok(RenderStatus::StillRunning),
        "succeeded" | "completed" => {
            let raw = body.video_url.ok_or_else(|| {
                PollError::Retryable("provider reported success without a video URL".to_string())
            })?;
            let result_url = validate_result_url(&raw).map_err(PollError::Retryable)?;
            Ok(RenderStatus::Succeeded { result_url })
        }
        "failed" => Ok(RenderStatus::Failed {
            reason: body
                .error
                .unwrap_or_else(|| "provider reported failure without detail".to_string()),
        }),
        other => Err(PollError::Retryable(format!(
            "unrecognized provider status: {other}"
        ))),
    }
}

#[async_trait]
impl VideoProvider for HttpVideoProvider {
    async fn submit(&self, request: &GenerationRequest) -> Result<ProviderJobId, SubmitError> {
        let body = SubmitBody {
            client_ref: request.escalation_id.to_string(),
            title: &request.title,
            script: &request.script,
            style: request.style.as_deref(),
        };

        let response = self
            .client
            .post(self.renders_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmitError::Retryable(transport_class(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("submit returned {status}: {detail}");
            return if status_is_retryable(status) {
                Err(SubmitError::Retryable(message))
            } else {
                Err(SubmitError::Fatal(message))
            };
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| SubmitError::Fatal(format!("malformed submit response: {e}")))?;

        let job_id = ProviderJobId::new(parsed.job_id)
            .map_err(|e| SubmitError::Fatal(format!("malformed submit response: {e}")))?;

        debug!(escalation_id = %request.escalation_id, job_id = %job_id, "submitted render");
        Ok(job_id)
    }

    async fn poll(&self, job_id: &ProviderJobId) -> Result<RenderStatus, PollError> {
        let response = self
            .client
            .get(self.render_url(job_id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| PollError::Retryable(transport_class(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            // A job the provider cannot find yet may simply not be visible;
            // the record stays in flight either way.
            return Err(PollError::Retryable(format!(
                "poll returned {status}: {detail}"
            )));
        }

        let parsed: PollResponse = response
            .json()
            .await
            .map_err(|e| PollError::Retryable(format!("malformed poll response: {e}")))?;

        normalize_poll(parsed)
    }
}
