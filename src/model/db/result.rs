use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A materialized tally row for one `(election, candidate)` pair.
///
/// Derived entirely from the vote ledger and upserted by the tally engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResult {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election: Id,
    pub candidate: Id,
    pub total_votes: u64,
}
