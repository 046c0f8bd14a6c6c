//! Sweep trigger binary.
//!
//! One invocation = one sweep. An external scheduler (cron, a timer service,
//! an operator's shell) runs this on whatever cadence it likes; the process
//! holds no state between runs, so overlapping invocations are safe.

use anyhow::Context;
use chrono::Duration;
use sqlx::postgres::PgPoolOptions;

use clipforge_infra::PostgresRecordStore;
use clipforge_pipeline::{SweepConfig, SweepRunner, SystemClock};
use clipforge_provider::{HttpProviderConfig, HttpVideoProvider};

fn env_or_warn(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        tracing::warn!("{key} not set; using default {default:?}");
        default.to_string()
    })
}

fn env_seconds(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: i64 = raw
                .parse()
                .with_context(|| format!("{key} must be an integer number of seconds"))?;
            Ok(Duration::seconds(secs))
        }
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clipforge_observability::init();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set (postgres://…)")?;
    let provider_url = env_or_warn("PROVIDER_BASE_URL", "http://localhost:9090");
    let provider_key = std::env::var("PROVIDER_API_KEY").unwrap_or_else(|_| {
        tracing::warn!("PROVIDER_API_KEY not set; using insecure dev default");
        "dev-key".to_string()
    });

    let defaults = SweepConfig::default();
    let batch_limit: usize = match std::env::var("SWEEP_BATCH_LIMIT") {
        Ok(raw) => raw
            .parse()
            .context("SWEEP_BATCH_LIMIT must be a positive integer")?,
        Err(_) => defaults.batch_limit,
    };
    let config = SweepConfig::default()
        .with_batch_limit(batch_limit)
        .with_ceiling(env_seconds("SWEEP_CEILING_SECS", defaults.ceiling)?)
        .with_claim_ttl(env_seconds("SWEEP_CLAIM_TTL_SECS", defaults.claim_ttl)?);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to postgres")?;
    let store = PostgresRecordStore::new(pool);

    let provider = HttpVideoProvider::new(HttpProviderConfig::new(provider_url, provider_key))
        .context("failed to build provider client")?;

    let runner = SweepRunner::new(store, provider, SystemClock, config);

    match runner.run_sweep().await {
        Ok(report) => {
            tracing::info!(?report, "sweep finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!(partial = ?e.partial, error = %e, "sweep aborted");
            Err(e.into())
        }
    }
}
