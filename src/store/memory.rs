use std::collections::{HashMap, HashSet};

use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    api::pagination::Pagination,
    db::{
        candidate::Candidate, election::Election, result::ElectionResult, user::User, vote::Vote,
    },
    mongodb::Id,
};

use super::{ReferenceData, ResultStore, Tally, VoteLedger};

#[derive(Default)]
struct Inner {
    elections: HashMap<Id, Election>,
    /// Kept in insertion order.
    candidates: Vec<Candidate>,
    users: HashMap<Id, User>,
    /// Kept in append order, which is creation order.
    votes: Vec<Vote>,
    /// The `(election, voter)` uniqueness index.
    voted: HashSet<(Id, Id)>,
    results: HashMap<(Id, Id), ElectionResult>,
}

/// An in-process store. Every operation holds one lock for its whole
/// duration, so each is trivially atomic and sees a consistent snapshot.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_election(&self, election: Election) {
        self.inner
            .lock()
            .await
            .elections
            .insert(election.id, election);
    }

    pub async fn insert_candidate(&self, candidate: Candidate) {
        let mut inner = self.inner.lock().await;
        inner.candidates.retain(|c| c.id != candidate.id);
        inner.candidates.push(candidate);
    }

    pub async fn insert_user(&self, user: User) {
        self.inner.lock().await.users.insert(user.id, user);
    }

    pub async fn remove_candidate(&self, id: Id) {
        self.inner.lock().await.candidates.retain(|c| c.id != id);
    }
}

#[rocket::async_trait]
impl ReferenceData for MemoryStore {
    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.inner.lock().await.elections.get(&id).cloned())
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        Ok(self.inner.lock().await.elections.values().cloned().collect())
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        let inner = self.inner.lock().await;
        Ok(inner.candidates.iter().find(|c| c.id == id).cloned())
    }

    async fn candidates_for_election(&self, election: Id) -> Result<Vec<Candidate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .candidates
            .iter()
            .filter(|c| c.election == election)
            .cloned()
            .collect())
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }
}

#[rocket::async_trait]
impl VoteLedger for MemoryStore {
    async fn has_voted(&self, election: Id, voter: Id) -> Result<bool> {
        Ok(self.inner.lock().await.voted.contains(&(election, voter)))
    }

    async fn append(&self, vote: &Vote) -> Result<Id> {
        let mut inner = self.inner.lock().await;
        let Inner {
            candidates,
            votes,
            voted,
            ..
        } = &mut *inner;

        let candidate = candidates
            .iter_mut()
            .find(|c| c.id == vote.candidate)
            .ok_or_else(|| Error::not_found(format!("Candidate with ID '{}'", vote.candidate)))?;
        if !voted.insert((vote.election, vote.voter)) {
            return Err(Error::DuplicateVote {
                election: vote.election.to_string(),
            });
        }
        candidate.votes += 1;
        votes.push(vote.clone());
        Ok(vote.id)
    }

    async fn list_by_election(
        &self,
        election: Id,
        page: Option<Pagination>,
    ) -> Result<Vec<Vote>> {
        let inner = self.inner.lock().await;
        let matching = inner.votes.iter().filter(|v| v.election == election);
        let votes = match page {
            Some(page) => matching
                .skip(page.skip() as usize)
                .take(page.page_size() as usize)
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        };
        Ok(votes)
    }

    async fn count_by_election(&self, election: Id) -> Result<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.votes.iter().filter(|v| v.election == election).count() as u64)
    }

    async fn tally(&self, election: Id) -> Result<Tally> {
        let inner = self.inner.lock().await;
        let mut tally = Tally::new();
        for vote in inner.votes.iter().filter(|v| v.election == election) {
            *tally.entry(vote.candidate).or_insert(0) += 1;
        }
        Ok(tally)
    }

    async fn set_candidate_counters(&self, counters: &Tally) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for candidate in inner.candidates.iter_mut() {
            if let Some(count) = counters.get(&candidate.id) {
                candidate.votes = *count;
            }
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl ResultStore for MemoryStore {
    async fn replace_results(&self, election: Id, totals: &Tally) -> Result<Vec<ElectionResult>> {
        let mut inner = self.inner.lock().await;
        inner
            .results
            .retain(|(e, c), _| *e != election || totals.contains_key(c));
        let mut rows = Vec::with_capacity(totals.len());
        for (candidate, total_votes) in totals {
            let row = inner
                .results
                .entry((election, *candidate))
                .or_insert_with(|| ElectionResult {
                    id: Id::new(),
                    election,
                    candidate: *candidate,
                    total_votes: 0,
                });
            row.total_votes = *total_votes;
            rows.push(row.clone());
        }
        rows.sort_by_key(|row| row.candidate);
        Ok(rows)
    }

    async fn results(&self, election: Id) -> Result<Vec<ElectionResult>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .results
            .values()
            .filter(|row| row.election == election)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.candidate);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[backend_test]
    async fn append_enforces_uniqueness_per_election(store: Arc<MemoryStore>) {
        let first = Election::ongoing_example();
        let second = Election::ongoing_example();
        let a = Candidate::example("Alice", first.id);
        let b = Candidate::example("Bob", second.id);
        store.insert_candidate(a.clone()).await;
        store.insert_candidate(b.clone()).await;
        let voter = Id::new();

        store
            .append(&Vote::new(first.id, a.id, voter, None))
            .await
            .unwrap();
        let err = store
            .append(&Vote::new(first.id, a.id, voter, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateVote { .. }));

        // The same voter may still vote in a different election.
        store
            .append(&Vote::new(second.id, b.id, voter, None))
            .await
            .unwrap();

        assert!(store.has_voted(first.id, voter).await.unwrap());
        assert!(store.has_voted(second.id, voter).await.unwrap());
        assert_eq!(store.count_by_election(first.id).await.unwrap(), 1);
        assert_eq!(store.candidate(a.id).await.unwrap().unwrap().votes, 1);
    }

    #[backend_test]
    async fn replace_results_drops_stale_rows(store: Arc<MemoryStore>) {
        let election = Id::new();
        let (a, b) = (Id::new(), Id::new());

        let first = store
            .replace_results(election, &Tally::from([(a, 2), (b, 1)]))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        let second = store
            .replace_results(election, &Tally::from([(a, 3)]))
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].total_votes, 3);
        // The row keeps its identity across upserts.
        let original_a = first.iter().find(|r| r.candidate == a).unwrap();
        assert_eq!(second[0].id, original_a.id);
        assert_eq!(store.results(election).await.unwrap(), second);
    }
}
