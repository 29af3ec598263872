use crate::models::VoteRecord;

/// Column width of both `votes.id` and `votes.vote`.
pub const MAX_FIELD_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Voter id is empty")]
    EmptyVoterId,
    #[error("Vote is empty")]
    EmptyVote,
    #[error("Voter id or vote contains a NUL character")]
    ContainsNul,
    #[error("Voter id exceeds maximum length of {MAX_FIELD_LENGTH} ({0} characters)")]
    VoterIdTooLong(usize),
    #[error("Vote exceeds maximum length of {MAX_FIELD_LENGTH} ({0} characters)")]
    VoteTooLong(usize),
}

/// Checks a decoded record against the constraints of the `votes` table.
pub fn validate_vote_record(record: &VoteRecord) -> Result<(), ValidationError> {
    if record.voter_id.is_empty() { return Err(ValidationError::EmptyVoterId); }
    if record.vote.is_empty() { return Err(ValidationError::EmptyVote); }
    // Postgres text columns cannot store U+0000.
    if record.voter_id.contains('\0') || record.vote.contains('\0') { return Err(ValidationError::ContainsNul); }

    let voter_id_len = record.voter_id.chars().count();
    if voter_id_len > MAX_FIELD_LENGTH { return Err(ValidationError::VoterIdTooLong(voter_id_len)); }

    let vote_len = record.vote.chars().count();
    if vote_len > MAX_FIELD_LENGTH { return Err(ValidationError::VoteTooLong(vote_len)); }

    Ok(())
}
