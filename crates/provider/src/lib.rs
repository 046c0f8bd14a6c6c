//! `clipforge-provider` — rendering-provider boundary.
//!
//! **Responsibility:** translate between the pipeline's vocabulary and the
//! remote generative-video service. Everything provider-specific (payload
//! shapes, status strings, HTTP error classes) is normalized here; the
//! lifecycle engine only ever sees [`RenderStatus`] and the typed error
//! taxonomy.
//!
//! Retry cadence lives entirely in successive sweeps: neither `submit` nor
//! `poll` loops or backs off internally.

pub mod client;
pub mod http;
pub mod request;

pub use client::{PollError, RenderStatus, SubmitError, VideoProvider};
pub use http::{HttpProviderConfig, HttpVideoProvider, ProviderConfigError};
pub use request::GenerationRequest;
