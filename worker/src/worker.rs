//! The polling loop that drains the vote queue into the store.
//!
//! Each iteration sleeps for the poll interval, makes sure the queue handle
//! is alive, pops at most one payload and either applies it or, when the
//! queue is empty, pings the store so the idle connection is not reaped.
//! Both handles are owned by the loop and replaced in place when they go bad.

use shared::{validate_vote_record, DecodeError, ValidationError, VoteRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::{
    config::{InFlightPolicy, LoopSettings},
    error::WorkerError,
    processor::{UpsertOutcome, VoteProcessor},
    queue::{QueueConnector, VoteQueue},
    store::{StoreConnector, VoteStore},
    utils::pause,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Polling,
    Processing,
    KeepAlive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Malformed(DecodeError),
    Invalid(ValidationError),
    /// The store handle was reopened while this vote was in flight.
    StoreReconnected,
}

/// What a single iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    KeptAlive,
    Applied {
        voter_id: String,
        outcome: UpsertOutcome,
    },
    Dropped(DropReason),
}

pub struct WorkerLoop<SC: StoreConnector, QC: QueueConnector> {
    store_connector: SC,
    queue_connector: QC,
    store: SC::Store,
    queue: QC::Queue,
    settings: LoopSettings,
    state: WorkerState,
    shutdown: CancellationToken,
}

impl<SC, QC> WorkerLoop<SC, QC>
where
    SC: StoreConnector,
    QC: QueueConnector,
{
    /// Opens the store, then the queue. Blocks until both are reachable.
    pub async fn connect(
        store_connector: SC,
        queue_connector: QC,
        settings: LoopSettings,
        shutdown: CancellationToken,
    ) -> Result<Self, WorkerError> {
        let store = store_connector.open(&shutdown).await?;
        let queue = queue_connector.open(&shutdown).await?;
        info!("📋 Worker ready, polling '{}'", settings.queue_key);

        Ok(Self {
            store_connector,
            queue_connector,
            store,
            queue,
            settings,
            state: WorkerState::Polling,
            shutdown,
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Runs until shutdown is requested or an unrecoverable error occurs.
    pub async fn run(&mut self) -> Result<(), WorkerError> {
        loop {
            if !pause(self.settings.poll_interval, &self.shutdown).await {
                info!("Leaving worker loop");
                return Ok(());
            }

            match self.step().await {
                Ok(step) => debug!(?step, "Iteration complete"),
                Err(WorkerError::ShuttingDown) => {
                    info!("Leaving worker loop during reconnect");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One iteration, without the pacing sleep.
    pub async fn step(&mut self) -> Result<Step, WorkerError> {
        self.state = WorkerState::Polling;

        if !self.queue.is_connected().await {
            info!("Reconnecting Redis");
            self.queue = self.queue_connector.open(&self.shutdown).await?;
        }

        match self.queue.pop(&self.settings.queue_key).await? {
            Some(payload) => {
                self.state = WorkerState::Processing;
                self.process(&payload).await
            }
            None => {
                self.state = WorkerState::KeepAlive;
                self.store.keep_alive().await?;
                Ok(Step::KeptAlive)
            }
        }
    }

    async fn process(&mut self, payload: &[u8]) -> Result<Step, WorkerError> {
        let record = match VoteRecord::decode(payload) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, payload = %String::from_utf8_lossy(payload), "Dropping undecodable vote");
                return Ok(Step::Dropped(DropReason::Malformed(e)));
            }
        };

        info!("Processing vote for '{}' by '{}'", record.vote, record.voter_id);

        if let Err(e) = validate_vote_record(&record) {
            warn!(error = %e, voter_id = %record.voter_id, "Dropping invalid vote");
            return Ok(Step::Dropped(DropReason::Invalid(e)));
        }

        if !self.store.is_open().await {
            info!("Reconnecting DB");
            self.store = self.store_connector.open(&self.shutdown).await?;

            if self.settings.in_flight == InFlightPolicy::Drop {
                warn!(voter_id = %record.voter_id, "Vote dropped after store reconnect");
                return Ok(Step::Dropped(DropReason::StoreReconnected));
            }
        }

        let outcome = VoteProcessor::upsert(
            &mut self.store,
            &record.voter_id,
            &record.vote,
            self.settings.upsert_fallback,
        )
        .await?;

        Ok(Step::Applied {
            voter_id: record.voter_id,
            outcome,
        })
    }
}
