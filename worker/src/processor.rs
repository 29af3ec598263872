use tracing::warn;
use crate::{config::UpsertFallback, store::{StoreError, VoteStore}};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

pub struct VoteProcessor;

impl VoteProcessor {
    /// Records `vote` as the current choice of `voter_id`.
    ///
    /// Tries an INSERT first and falls back to an UPDATE of the existing row
    /// when the insert is refused by the database. With
    /// [`UpsertFallback::AnyDatabaseError`] every database-level refusal takes
    /// that path, not only duplicate keys, so a row that does not exist yet
    /// can end up silently unwritten. Transport errors always propagate.
    pub async fn upsert<S>(
        store: &mut S,
        voter_id: &str,
        vote: &str,
        fallback: UpsertFallback,
    ) -> Result<UpsertOutcome, StoreError>
    where
        S: VoteStore + ?Sized,
    {
        match store.insert_vote(voter_id, vote).await {
            Ok(()) => Ok(UpsertOutcome::Inserted),
            Err(StoreError::UniqueViolation(_)) => {
                store.update_vote(voter_id, vote).await?;
                Ok(UpsertOutcome::Updated)
            }
            Err(StoreError::Rejected(reason)) if fallback == UpsertFallback::AnyDatabaseError => {
                warn!(voter_id, %reason, "Insert rejected, falling back to update");
                store.update_vote(voter_id, vote).await?;
                Ok(UpsertOutcome::Updated)
            }
            Err(e) => Err(e),
        }
    }
}
