use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use worker::{
    config::WorkerConfig,
    error::WorkerError,
    queue::RedisQueueConnector,
    store::PgStoreConnector,
    utils::shutdown_on_signal,
    worker::WorkerLoop,
};

async fn run() -> Result<(), WorkerError> {
    let config = WorkerConfig::from_env()?;
    info!("🚀 Starting vote worker");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let store = PgStoreConnector::new(config.store, config.reconnect_backoff);
    let queue = RedisQueueConnector::new(config.queue, config.reconnect_backoff);

    let mut worker = WorkerLoop::connect(store, queue, config.loop_settings, shutdown).await?;
    worker.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) | Err(WorkerError::ShuttingDown) => {
            info!("Worker stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}
