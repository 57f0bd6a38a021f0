use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use jetson_pilot::config::Config;
use jetson_pilot::context::PipelineContext;
use jetson_pilot::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    std::fs::create_dir_all(&config.dataset_dir)
        .with_context(|| format!("creating dataset dir {}", config.dataset_dir.display()))?;

    info!(
        publisher = %config.publisher,
        listen = %config.listen,
        dataset = %config.dataset_dir.display(),
        "starting jetson pilot console"
    );

    let listen = config.listen.clone();
    let (ctx, ingest) = PipelineContext::new(config);

    tokio::spawn(async move {
        // The loop itself never returns; only subscription setup can fail.
        if let Err(e) = ingest.run().await {
            error!(error = %e, "ingest receiver exited");
        }
    });

    server::serve(ctx, &listen).await
}
