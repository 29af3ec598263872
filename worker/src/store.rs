use std::time::Duration;
use async_trait::async_trait;
use sqlx::{Connection, PgConnection, postgres::PgConnectOptions};
use shared::models::VoteRow;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use crate::{error::WorkerError, queries::Queries, utils::pause};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("Statement rejected by database: {0}")]
    Rejected(String),
    #[error("Database transport error: {0}")]
    Transport(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::Database(db) => StoreError::Rejected(db.to_string()),
            other => StoreError::Transport(other),
        }
    }
}

/// An open handle on the relational store.
#[async_trait]
pub trait VoteStore: Send {
    /// Whether the handle can still carry statements.
    async fn is_open(&mut self) -> bool;
    async fn insert_vote(&mut self, voter_id: &str, vote: &str) -> Result<(), StoreError>;
    /// Updates the voter's row. Affecting zero rows is not an error.
    async fn update_vote(&mut self, voter_id: &str, vote: &str) -> Result<(), StoreError>;
    async fn keep_alive(&mut self) -> Result<(), StoreError>;
}

/// Opens store handles, blocking until the store is reachable.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: VoteStore;

    /// Retries transient failures forever with a fixed backoff and makes
    /// sure the `votes` table exists before returning. Only a shutdown
    /// request or a non-transient error ends the wait early.
    async fn open(&self, shutdown: &CancellationToken) -> Result<Self::Store, WorkerError>;
}

pub struct PgVoteStore {
    conn: PgConnection,
}

impl PgVoteStore {
    pub async fn fetch_votes(&mut self) -> Result<Vec<VoteRow>, StoreError> {
        Ok(Queries::fetch_votes(&mut self.conn).await?)
    }
}

#[async_trait]
impl VoteStore for PgVoteStore {
    async fn is_open(&mut self) -> bool {
        self.conn.ping().await.is_ok()
    }

    async fn insert_vote(&mut self, voter_id: &str, vote: &str) -> Result<(), StoreError> {
        Queries::insert_vote(&mut self.conn, voter_id, vote).await?;
        Ok(())
    }

    async fn update_vote(&mut self, voter_id: &str, vote: &str) -> Result<(), StoreError> {
        Queries::update_vote(&mut self.conn, voter_id, vote).await?;
        Ok(())
    }

    async fn keep_alive(&mut self) -> Result<(), StoreError> {
        Queries::keep_alive(&mut self.conn).await?;
        Ok(())
    }
}

pub struct PgStoreConnector {
    options: PgConnectOptions,
    backoff: Duration,
}

impl PgStoreConnector {
    pub fn new(options: PgConnectOptions, backoff: Duration) -> Self {
        Self { options, backoff }
    }

    fn is_transient(e: &sqlx::Error) -> bool {
        matches!(
            e,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) | sqlx::Error::Database(_)
        )
    }
}

#[async_trait]
impl StoreConnector for PgStoreConnector {
    type Store = PgVoteStore;

    async fn open(&self, shutdown: &CancellationToken) -> Result<PgVoteStore, WorkerError> {
        let mut conn = loop {
            match PgConnection::connect_with(&self.options).await {
                Ok(conn) => break conn,
                Err(e) if Self::is_transient(&e) => {
                    error!(error = %e, "Waiting for db");
                    if !pause(self.backoff, shutdown).await {
                        return Err(WorkerError::ShuttingDown);
                    }
                }
                Err(e) => return Err(StoreError::from(e).into()),
            }
        };

        info!("Connected to db");
        Queries::create_votes_table(&mut conn)
            .await
            .map_err(StoreError::from)?;

        Ok(PgVoteStore { conn })
    }
}
