//! Sweep configuration.

use chrono::Duration;

/// Tunables for one sweep invocation.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Maximum records fetched per discovery bucket.
    pub batch_limit: usize,
    /// Wall-clock ceiling for the whole sweep.
    pub ceiling: Duration,
    /// Age after which a `Pending` claim with no provider job is considered
    /// abandoned and rediscovered.
    pub claim_ttl: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_limit: 25,
            ceiling: Duration::seconds(60),
            claim_ttl: Duration::minutes(5),
        }
    }
}

impl SweepConfig {
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_claim_ttl(mut self, ttl: Duration) -> Self {
        self.claim_ttl = ttl;
        self
    }
}
