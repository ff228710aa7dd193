use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{
    api::pagination::{Paginated, Pagination},
    db::{election::Election, vote::Vote},
    mongodb::Id,
};
use crate::store::SharedStore;

use super::cache::ResultsCache;

/// Accepts votes into the ledger.
#[derive(Clone)]
pub struct CastingService {
    store: SharedStore,
    cache: Arc<ResultsCache>,
}

impl CastingService {
    pub fn new(store: SharedStore, cache: Arc<ResultsCache>) -> Self {
        Self { store, cache }
    }

    /// Record `voter`'s vote for `candidate` in `election`.
    ///
    /// Checks run in a fixed order: the election exists, the candidate
    /// exists, the candidate stands in that election, the election is
    /// ongoing, and the voter is known. Only then is the vote appended,
    /// which fails with [`Error::DuplicateVote`] if the voter has already
    /// voted in this election, however many requests race for it.
    pub async fn cast_vote(&self, voter: Id, election: Id, candidate: Id) -> Result<Vote> {
        let election_doc = self.require_election(election).await?;

        let candidate_doc = self
            .store
            .candidate(candidate)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate with ID '{candidate}'")))?;
        if candidate_doc.election != election {
            return Err(Error::invalid_reference(format!(
                "Candidate '{candidate}' does not stand in election '{election}'"
            )));
        }

        let status = election_doc.status();
        if !status.is_votable() {
            return Err(Error::ElectionNotVotable {
                election: election.to_string(),
                status: status.to_string(),
            });
        }

        let voter_doc = self
            .store
            .user(voter)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter with ID '{voter}'")))?;

        let vote = Vote::new(election, candidate, voter, voter_doc.department);
        match self.store.append(&vote).await {
            Ok(_) => {
                self.cache.invalidate(election).await;
                info!("Voter {voter} cast vote {} in election {election}", vote.id);
                Ok(vote)
            }
            Err(e @ Error::DuplicateVote { .. }) => {
                warn!("Rejected second vote from voter {voter} in election {election}");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Has `voter` already voted in `election`?
    pub async fn has_voted(&self, voter: Id, election: Id) -> Result<bool> {
        self.require_election(election).await?;
        self.store.has_voted(election, voter).await
    }

    /// A page of the ledger for `election`, in creation order.
    pub async fn list_votes(&self, election: Id, page: Pagination) -> Result<Paginated<Vote>> {
        self.require_election(election).await?;
        let total = self.store.count_by_election(election).await?;
        let votes = self.store.list_by_election(election, Some(page)).await?;
        Ok(page.paginate(total, votes))
    }

    async fn require_election(&self, election: Id) -> Result<Election> {
        self.store
            .election(election)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election with ID '{election}'")))
    }
}
