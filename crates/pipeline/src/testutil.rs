//! Scripted fake provider shared by the engine and sweep tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use clipforge_core::{EscalationId, ProviderJobId};
use clipforge_provider::{
    GenerationRequest, PollError, RenderStatus, SubmitError, VideoProvider,
};

#[derive(Debug, Clone)]
enum SubmitStep {
    Ok(String),
    Retryable(String),
    Fatal(String),
}

/// Declarative behavior for a [`FakeProvider`].
///
/// Submits consume the submit queue (last step repeats once exhausted);
/// polls consume the poll queue (still-running once exhausted).
#[derive(Debug, Clone, Default)]
pub struct ProviderScript {
    submits: Vec<SubmitStep>,
    polls: Vec<Result<RenderStatus, PollError>>,
}

impl ProviderScript {
    pub fn submit_ok(job_id: &str) -> Self {
        Self {
            submits: vec![SubmitStep::Ok(job_id.to_string())],
            polls: Vec::new(),
        }
    }

    pub fn submit_retryable(reason: &str) -> Self {
        Self {
            submits: vec![SubmitStep::Retryable(reason.to_string())],
            polls: Vec::new(),
        }
    }

    pub fn submit_fatal(reason: &str) -> Self {
        Self {
            submits: vec![SubmitStep::Fatal(reason.to_string())],
            polls: Vec::new(),
        }
    }

    pub fn then_submit_ok(mut self, job_id: &str) -> Self {
        self.submits.push(SubmitStep::Ok(job_id.to_string()));
        self
    }

    pub fn then_poll_running(mut self, times: usize) -> Self {
        for _ in 0..times {
            self.polls.push(Ok(RenderStatus::StillRunning));
        }
        self
    }

    pub fn then_poll_succeed(mut self, result_url: &str) -> Self {
        self.polls.push(Ok(RenderStatus::Succeeded {
            result_url: result_url.to_string(),
        }));
        self
    }

    pub fn then_poll_fail(mut self, reason: &str) -> Self {
        self.polls.push(Ok(RenderStatus::Failed {
            reason: reason.to_string(),
        }));
        self
    }

    pub fn then_poll_error(mut self, reason: &str) -> Self {
        self.polls.push(Err(PollError::Retryable(reason.to_string())));
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    submit_queue: VecDeque<SubmitStep>,
    last_submit: Option<SubmitStep>,
    poll_queue: VecDeque<Result<RenderStatus, PollError>>,
    submit_calls: usize,
    poll_calls: usize,
    accepted: HashMap<EscalationId, String>,
}

/// Scripted in-memory `VideoProvider`.
///
/// Enforces the no-double-submission property: a second submit for an
/// escalation whose first submit already returned a job id fails the test
/// immediately. Retryable-errored submits assigned no job, so re-submitting
/// those on a later sweep is legitimate.
#[derive(Debug, Clone, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProvider {
    pub fn new(script: ProviderScript) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                submit_queue: script.submits.into(),
                poll_queue: script.polls.into(),
                ..FakeState::default()
            })),
        }
    }

    pub fn submit_calls(&self) -> usize {
        self.state.lock().unwrap().submit_calls
    }

    pub fn poll_calls(&self) -> usize {
        self.state.lock().unwrap().poll_calls
    }
}

#[async_trait]
impl VideoProvider for FakeProvider {
    async fn submit(&self, request: &GenerationRequest) -> Result<ProviderJobId, SubmitError> {
        let mut state = self.state.lock().unwrap();
        state.submit_calls += 1;

        if let Some(existing) = state.accepted.get(&request.escalation_id) {
            panic!(
                "double submission for {} (already accepted as {existing})",
                request.escalation_id
            );
        }

        let step = match state.submit_queue.pop_front() {
            Some(step) => {
                state.last_submit = Some(step.clone());
                step
            }
            None => state
                .last_submit
                .clone()
                .expect("fake provider received a submit with no scripted behavior"),
        };

        match step {
            SubmitStep::Ok(job_id) => {
                state.accepted.insert(request.escalation_id, job_id.clone());
                Ok(ProviderJobId::new(job_id).unwrap())
            }
            SubmitStep::Retryable(reason) => Err(SubmitError::Retryable(reason)),
            SubmitStep::Fatal(reason) => Err(SubmitError::Fatal(reason)),
        }
    }

    async fn poll(&self, _job_id: &ProviderJobId) -> Result<RenderStatus, PollError> {
        let mut state = self.state.lock().unwrap();
        state.poll_calls += 1;
        state
            .poll_queue
            .pop_front()
            .unwrap_or(Ok(RenderStatus::StillRunning))
    }
}
