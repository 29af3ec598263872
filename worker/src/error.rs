use thiserror::Error;
use crate::{config::ConfigError, queue::QueueError, store::StoreError};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Shutdown requested")]
    ShuttingDown,
}
