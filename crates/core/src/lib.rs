//! `clipforge-core` — domain foundation for the video-generation pipeline.
//!
//! This crate contains **pure domain** primitives (no storage or transport
//! concerns): strongly-typed identifiers, the per-escalation generation
//! record, and the closed set of state transitions the pipeline may propose.

pub mod error;
pub mod id;
pub mod record;

pub use error::{DomainError, DomainResult};
pub use id::{EscalationId, ProviderJobId};
pub use record::{GenerationRecord, GenerationStatus, Transition};
