//! Strongly-typed identifiers used across the pipeline.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Identifier of an escalation eligible for video generation.
///
/// Owned by the record store; immutable for the lifetime of the record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscalationId(Uuid);

impl EscalationId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EscalationId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for EscalationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for EscalationId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<EscalationId> for Uuid {
    fn from(value: EscalationId) -> Self {
        value.0
    }
}

impl FromStr for EscalationId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::invalid_id(format!("EscalationId: {}", e)))?;
        Ok(Self(uuid))
    }
}

/// Opaque identifier the rendering provider assigns to a submitted job.
///
/// The provider owns the format; we never parse it, only echo it back on
/// poll. Immutable once recorded on a generation record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderJobId(String);

impl ProviderJobId {
    /// Wrap a provider-assigned identifier.
    ///
    /// Rejects empty/whitespace identifiers: a blank job id is always a
    /// malformed provider response, never a real job.
    pub fn new(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DomainError::validation("provider job id must not be empty"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProviderJobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
