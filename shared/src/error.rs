use thiserror::Error;

/// Reasons a queue payload could not be turned into a [`crate::VoteRecord`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed vote payload: {0}")]
    Malformed(String),
    #[error("Vote payload is missing field `{0}`")]
    MissingField(&'static str),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Malformed(e.to_string())
    }
}
