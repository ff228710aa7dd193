//! Storage seams of the voting core.
//!
//! [`ReferenceData`] is read-only access to data owned by the CRUD
//! collaborators, [`VoteLedger`] is the append-only, uniqueness-enforcing
//! record of votes, and [`ResultStore`] holds the materialized tallies.
//! [`MongoStore`] is the production implementation; [`MemoryStore`] keeps
//! everything in process.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    api::pagination::Pagination,
    db::{
        candidate::Candidate, election::Election, result::ElectionResult, user::User, vote::Vote,
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Per-candidate vote counts for one election.
pub type Tally = HashMap<Id, u64>;

/// Read-only reference data.
#[rocket::async_trait]
pub trait ReferenceData: Send + Sync {
    async fn election(&self, id: Id) -> Result<Option<Election>>;

    async fn elections(&self) -> Result<Vec<Election>>;

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>>;

    /// All candidates standing in the given election, in a stable order.
    async fn candidates_for_election(&self, election: Id) -> Result<Vec<Candidate>>;

    async fn user(&self, id: Id) -> Result<Option<User>>;
}

/// The vote ledger.
#[rocket::async_trait]
pub trait VoteLedger: Send + Sync {
    async fn has_voted(&self, election: Id, voter: Id) -> Result<bool>;

    /// Atomically record a vote and bump the candidate's cached counter.
    ///
    /// Fails with [`crate::error::Error::DuplicateVote`] if the voter already
    /// has a vote in this election, in which case nothing is written.
    async fn append(&self, vote: &Vote) -> Result<Id>;

    /// Votes in an election ordered by creation time, optionally paginated.
    async fn list_by_election(&self, election: Id, page: Option<Pagination>)
        -> Result<Vec<Vote>>;

    async fn count_by_election(&self, election: Id) -> Result<u64>;

    /// Count votes per candidate from a single consistent read of the ledger.
    async fn tally(&self, election: Id) -> Result<Tally>;

    /// Overwrite cached candidate counters with the given values.
    async fn set_candidate_counters(&self, counters: &Tally) -> Result<()>;
}

/// Materialized per-candidate results.
#[rocket::async_trait]
pub trait ResultStore: Send + Sync {
    /// Make the stored results for `election` exactly `totals`: upsert one
    /// row per entry keyed on `(election, candidate)` and drop rows for any
    /// other candidate. Applied as a single unit.
    async fn replace_results(&self, election: Id, totals: &Tally) -> Result<Vec<ElectionResult>>;

    async fn results(&self, election: Id) -> Result<Vec<ElectionResult>>;
}

/// Everything the voting core needs from storage.
pub trait Store: ReferenceData + VoteLedger + ResultStore {}

impl<T> Store for T where T: ReferenceData + VoteLedger + ResultStore {}

/// The storage handle kept in managed state.
pub type SharedStore = Arc<dyn Store>;
