//! Generation request payload.

use serde::{Deserialize, Serialize};

use clipforge_core::{DomainError, DomainResult, EscalationId};

/// What we ask the provider to render for one escalation.
///
/// Built from record/escalation data by the caller; the provider crate only
/// validates it and maps it onto the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The escalation this video belongs to. Sent to the provider as a
    /// client reference so renders can be correlated in its dashboard.
    pub escalation_id: EscalationId,
    /// Short human-readable subject line.
    pub title: String,
    /// The narration/script the video is generated from.
    pub script: String,
    /// Optional provider style preset (e.g. "explainer", "whiteboard").
    pub style: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        escalation_id: EscalationId,
        title: impl Into<String>,
        script: impl Into<String>,
    ) -> DomainResult<Self> {
        let title = title.into();
        let script = script.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("request title must not be empty"));
        }
        if script.trim().is_empty() {
            return Err(DomainError::validation("request script must not be empty"));
        }
        Ok(Self {
            escalation_id,
            title,
            script,
            style: None,
        })
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}
