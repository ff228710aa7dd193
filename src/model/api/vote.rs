use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::ApiId, db::vote::Vote};

/// Body of a cast-vote request. The voter is taken from the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastVoteRequest {
    pub election: ApiId,
    pub candidate: ApiId,
}

/// Confirmation returned to the voter after a successful cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub id: ApiId,
    pub election: ApiId,
    pub candidate: ApiId,
    pub created_at: DateTime<Utc>,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id.into(),
            election: vote.election.into(),
            candidate: vote.candidate.into(),
            created_at: vote.created_at,
        }
    }
}

/// A ledger entry as shown in listings. Deliberately omits the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteListing {
    pub id: ApiId,
    pub voter: ApiId,
    pub department: Option<ApiId>,
    pub created_at: DateTime<Utc>,
}

impl From<Vote> for VoteListing {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id.into(),
            voter: vote.voter.into(),
            department: vote.department.map(Into::into),
            created_at: vote.created_at,
        }
    }
}

/// Whether the calling voter has already voted in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotedStatus {
    pub election: ApiId,
    pub has_voted: bool,
}
