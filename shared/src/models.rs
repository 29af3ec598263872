use serde::{Serialize, Deserialize};
use crate::error::DecodeError;

/// Name of the list the voting front end pushes onto.
pub const VOTES_QUEUE: &str = "votes";

/// A single vote as it travels through the queue.
///
/// Payloads are JSON objects with exactly the two string fields below.
/// Unknown fields are ignored so producers can add metadata without
/// breaking the worker; a missing or `null` field rejects the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRecord {
    pub vote: String,
    pub voter_id: String,
}

#[derive(Deserialize)]
struct RawVoteRecord {
    vote: Option<String>,
    voter_id: Option<String>,
}

impl VoteRecord {
    pub fn new(voter_id: impl Into<String>, vote: impl Into<String>) -> Self {
        Self {
            vote: vote.into(),
            voter_id: voter_id.into(),
        }
    }

    /// Decodes a raw queue payload. Payloads must be UTF-8.
    pub fn decode(payload: impl AsRef<[u8]>) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload.as_ref())
            .map_err(|e| DecodeError::Malformed(format!("payload is not UTF-8: {e}")))?;
        let raw: RawVoteRecord = serde_json::from_str(text)?;
        Ok(Self {
            vote: raw.vote.ok_or(DecodeError::MissingField("vote"))?,
            voter_id: raw.voter_id.ok_or(DecodeError::MissingField("voter_id"))?,
        })
    }

    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A row of the `votes` table: one per voter, holding their latest choice.
#[cfg_attr(feature = "store", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VoteRow {
    pub id: String,
    pub vote: String,
}
