//! Biochar MRV verification engine - JSON lines runner
//!
//! Reads plot, batch and photo submissions from stdin and writes one verdict
//! per line to stdout. Logs go to stderr.

use std::sync::Arc;

use tokio::io::{stdin, stdout, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mrv_engine::{runner, Config, VerificationEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mrv_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting biochar MRV verification engine");
    tracing::info!("Environment: {}", config.environment);

    // Model training can take a moment; keep it off the async workers
    let engine = tokio::task::spawn_blocking(move || VerificationEngine::from_config(config)).await??;
    let engine = Arc::new(engine);

    let summary = runner::run(engine, BufReader::new(stdin()), stdout()).await?;
    tracing::info!(
        processed = summary.processed,
        failed = summary.failed,
        "Input exhausted, shutting down"
    );

    Ok(())
}
