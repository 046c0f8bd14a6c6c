//! `clipforge-pipeline` — the video-generation job state machine.
//!
//! ## Design
//!
//! - One sweep = discover candidates, run each through the lifecycle engine,
//!   aggregate counters. Invoked statelessly by an external scheduler.
//! - All mutation funnels through `RecordStore::try_transition`, a write
//!   conditional on the previously read status. That conditional write is
//!   the only concurrency-control primitive: overlapping sweeps race, the
//!   first writer wins, losers are dropped as no-ops.
//! - A sweep runs under a wall-clock ceiling. The budget is checked between
//!   records, never inside a record's unit of work, so hitting the ceiling
//!   can never leave a record half-written.
//!
//! ## Components
//!
//! - `RecordStore`: persistence boundary (in-memory here, Postgres in
//!   `clipforge-infra`)
//! - `LifecycleEngine`: claim/submit and poll passes for a single record
//! - `SweepRunner`: the externally triggered orchestrator
//! - `StatusReporter`: read-only status queries for clients

pub mod clock;
pub mod config;
pub mod engine;
pub mod status;
pub mod store;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testutil;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SweepConfig;
pub use engine::{LifecycleEngine, PollOutcome, SubmitOutcome};
pub use status::{StatusError, StatusReporter, StatusView};
pub use store::{InMemoryRecordStore, RecordStore, StoreError};
pub use sweep::{SweepError, SweepReport, SweepRunner};
