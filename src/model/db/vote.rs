use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A ledger entry: one voter's vote in one election.
///
/// At most one of these exists per `(election, voter)` pair; the storage
/// layer enforces this with a unique index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election: Id,
    pub candidate: Id,
    pub voter: Id,
    /// The voter's department at the moment the vote was cast.
    #[serde(default)]
    pub department: Option<Id>,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Vote {
    /// Create a new vote stamped with the current time.
    pub fn new(election: Id, candidate: Id, voter: Id, department: Option<Id>) -> Self {
        Self {
            id: Id::new(),
            election,
            candidate,
            voter,
            department,
            created_at: Utc::now(),
        }
    }
}
