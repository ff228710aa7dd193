use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    common::{
        election::ElectionStatus,
        results::{CounterCorrection, ResultRow},
    },
    db::{candidate::Candidate, election::Election, result::ElectionResult},
    mongodb::Id,
};
use crate::store::{SharedStore, Tally};

use super::cache::ResultsCache;

/// Computes, publishes and reads election results.
///
/// Calculation, uncached reads and counter reconciliation for one election
/// are serialized by a per-election lock, so concurrent calls cannot
/// interleave their writes. Different elections proceed independently.
#[derive(Clone)]
pub struct TallyEngine {
    store: SharedStore,
    cache: Arc<ResultsCache>,
    locks: Arc<Mutex<HashMap<Id, Arc<Mutex<()>>>>>,
}

impl TallyEngine {
    pub fn new(store: SharedStore, cache: Arc<ResultsCache>) -> Self {
        Self {
            store,
            cache,
            locks: Default::default(),
        }
    }

    /// Recompute the results of an election from the vote ledger and
    /// publish them, replacing whatever was published before.
    pub async fn calculate_results(&self, election: Id) -> Result<Vec<ResultRow>> {
        let lock = self.election_lock(election).await;
        let _guard = lock.lock().await;

        self.require_election(election).await?;
        let candidates = self.store.candidates_for_election(election).await?;
        let tally = self.store.tally(election).await?;
        let totals = totals_for(election, &candidates, &tally)?;

        self.store.replace_results(election, &totals).await?;
        self.cache.invalidate(election).await;

        let rows = join(&candidates, &totals);
        info!(
            "Calculated results for election {election}: {} votes across {} candidates",
            totals.values().sum::<u64>(),
            rows.len()
        );
        Ok(rows)
    }

    /// The results of an election, one row per current candidate, counted
    /// from the vote ledger.
    ///
    /// Candidates without votes are reported with zero. Rows are served from
    /// the cache until the next vote or calculation. Reading a completed
    /// election republishes its results if the published rows have gone stale.
    pub async fn get_results(&self, election: Id) -> Result<(Election, Vec<ResultRow>)> {
        let election_doc = self.require_election(election).await?;

        let ticket = match self.cache.get(election).await {
            Ok(rows) => return Ok((election_doc, rows)),
            Err(ticket) => ticket,
        };

        let lock = self.election_lock(election).await;
        let _guard = lock.lock().await;

        let candidates = self.store.candidates_for_election(election).await?;
        let tally = self.store.tally(election).await?;
        let totals = totals_for(election, &candidates, &tally)?;

        if election_doc.status() == ElectionStatus::Completed {
            let published = self.store.results(election).await?;
            if !is_current(&published, &totals) {
                debug!("Published results of election {election} are stale, republishing");
                self.store.replace_results(election, &totals).await?;
            }
        }

        let rows = join(&candidates, &totals);
        self.cache.put(election, ticket, rows.clone()).await;
        Ok((election_doc, rows))
    }

    /// Recompute every candidate's cached vote counter from the ledger.
    /// Returns the counters that had drifted.
    pub async fn reconcile_counters(&self, election: Id) -> Result<Vec<CounterCorrection>> {
        let lock = self.election_lock(election).await;
        let _guard = lock.lock().await;

        self.require_election(election).await?;
        let candidates = self.store.candidates_for_election(election).await?;
        let tally = self.store.tally(election).await?;
        let totals = totals_for(election, &candidates, &tally)?;

        let corrected: Vec<_> = candidates
            .iter()
            .filter_map(|c| {
                let actual = totals.get(&c.id).copied().unwrap_or_default();
                (c.votes != actual).then_some(CounterCorrection {
                    candidate: c.id,
                    cached: c.votes,
                    actual,
                })
            })
            .collect();

        if corrected.is_empty() {
            debug!("Vote counters for election {election} are consistent");
        } else {
            self.store.set_candidate_counters(&totals).await?;
            warn!(
                "Corrected {} drifted vote counters in election {election}",
                corrected.len()
            );
        }
        Ok(corrected)
    }

    async fn require_election(&self, election: Id) -> Result<Election> {
        self.store
            .election(election)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election with ID '{election}'")))
    }

    async fn election_lock(&self, election: Id) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(election).or_default().clone()
    }
}

/// Vote totals for every current candidate, zero included.
///
/// Fails if the ledger holds votes for a candidate that no longer stands in
/// the election, as no consistent result can be published then.
fn totals_for(election: Id, candidates: &[Candidate], tally: &Tally) -> Result<Tally> {
    let standing: HashSet<Id> = candidates.iter().map(|c| c.id).collect();
    if let Some(orphan) = tally.keys().find(|id| !standing.contains(id)) {
        error!("Votes in election {election} reference unknown candidate {orphan}");
        return Err(Error::storage(format!(
            "Votes in election {election} reference unknown candidate {orphan}"
        )));
    }
    Ok(candidates
        .iter()
        .map(|c| (c.id, tally.get(&c.id).copied().unwrap_or_default()))
        .collect())
}

/// Do the published rows hold exactly these totals?
fn is_current(published: &[ElectionResult], totals: &Tally) -> bool {
    published.len() == totals.len()
        && published
            .iter()
            .all(|r| totals.get(&r.candidate) == Some(&r.total_votes))
}

/// Left-join candidates with their totals, in candidate order.
fn join(candidates: &[Candidate], totals: &Tally) -> Vec<ResultRow> {
    candidates
        .iter()
        .map(|c| ResultRow {
            candidate: c.id,
            name: c.name.clone(),
            total_votes: totals.get(&c.id).copied().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rocket::tokio::spawn;

    use super::*;
    use crate::error::ErrorKind;
    use crate::model::db::vote::Vote;
    use crate::store::{MemoryStore, ReferenceData, ResultStore, VoteLedger};
    use crate::voting::{
        fixtures::Fixture,
        winner::{get_winner, Winner},
    };

    fn totals(rows: &[ResultRow]) -> Vec<u64> {
        rows.iter().map(|r| r.total_votes).collect()
    }

    #[rocket::async_test]
    async fn counts_every_vote_once() {
        let fixture = Fixture::new(Election::ongoing_example(), &["A", "B", "C"], 5).await;
        fixture.cast(0, 0).await;
        fixture.cast(1, 1).await;
        fixture.cast(2, 1).await;
        fixture.cast(3, 2).await;
        fixture.cast(4, 2).await;

        let rows = fixture
            .engine()
            .calculate_results(fixture.election.id)
            .await
            .unwrap();
        assert_eq!(totals(&rows), vec![1, 2, 2]);
        assert_eq!(
            rows.iter().map(|r| r.total_votes).sum::<u64>(),
            fixture
                .store
                .count_by_election(fixture.election.id)
                .await
                .unwrap()
        );
        assert_eq!(
            get_winner(&rows),
            Winner::Tie(vec![rows[1].clone(), rows[2].clone()])
        );
    }

    #[rocket::async_test]
    async fn recalculation_is_idempotent() {
        let fixture = Fixture::new(Election::ongoing_example(), &["A", "B"], 2).await;
        fixture.cast(0, 0).await;
        fixture.cast(1, 0).await;
        let engine = fixture.engine();

        let first = engine.calculate_results(fixture.election.id).await.unwrap();
        let stored = fixture.store.results(fixture.election.id).await.unwrap();
        let second = engine.calculate_results(fixture.election.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            stored,
            fixture.store.results(fixture.election.id).await.unwrap()
        );
    }

    #[rocket::async_test]
    async fn candidates_without_votes_report_zero() {
        let fixture = Fixture::new(Election::ongoing_example(), &["A", "B", "C"], 1).await;
        fixture.cast(0, 1).await;
        let engine = fixture.engine();

        engine.calculate_results(fixture.election.id).await.unwrap();
        let (_, rows) = engine.get_results(fixture.election.id).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(totals(&rows), vec![0, 1, 0]);
    }

    #[rocket::async_test]
    async fn new_votes_invalidate_cached_results() {
        let fixture = Fixture::new(Election::ongoing_example(), &["A"], 2).await;
        let engine = fixture.engine();
        fixture.cast(0, 0).await;
        engine.calculate_results(fixture.election.id).await.unwrap();
        let (_, before) = engine.get_results(fixture.election.id).await.unwrap();

        fixture.cast(1, 0).await;
        engine.calculate_results(fixture.election.id).await.unwrap();
        let (_, after) = engine.get_results(fixture.election.id).await.unwrap();

        assert_eq!(totals(&before), vec![1]);
        assert_eq!(totals(&after), vec![2]);
    }

    #[rocket::async_test]
    async fn ongoing_results_follow_the_ledger() {
        let fixture = Fixture::new(Election::ongoing_example(), &["A", "B"], 2).await;
        let engine = fixture.engine();

        for (voter, expected) in [(0, vec![1, 0]), (1, vec![1, 1])] {
            fixture.cast(voter, voter).await;
            let (election, rows) = engine.get_results(fixture.election.id).await.unwrap();
            assert_eq!(election.status(), ElectionStatus::Ongoing);
            assert_eq!(totals(&rows), expected);
            assert_eq!(
                rows.iter().map(|r| r.total_votes).sum::<u64>(),
                fixture
                    .store
                    .count_by_election(fixture.election.id)
                    .await
                    .unwrap()
            );
        }

        // Reading an open election publishes nothing.
        assert!(fixture
            .store
            .results(fixture.election.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[rocket::async_test]
    async fn stale_results_are_recounted_after_close() {
        let mut fixture = Fixture::new(Election::ongoing_example(), &["A", "B"], 3).await;
        let engine = fixture.engine();
        fixture.cast(0, 0).await;
        engine.calculate_results(fixture.election.id).await.unwrap();

        fixture.cast(1, 1).await;
        fixture.cast(2, 1).await;
        fixture.close().await;

        let (election, rows) = engine.get_results(fixture.election.id).await.unwrap();
        assert_eq!(election.status(), ElectionStatus::Completed);
        assert_eq!(totals(&rows), vec![1, 2]);
        assert_eq!(
            rows.iter().map(|r| r.total_votes).sum::<u64>(),
            fixture
                .store
                .count_by_election(fixture.election.id)
                .await
                .unwrap()
        );
        assert_eq!(get_winner(&rows), Winner::Single(rows[1].clone()));

        let mut stored: Vec<_> = fixture
            .store
            .results(fixture.election.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.candidate, r.total_votes))
            .collect();
        stored.sort();
        let mut expected = vec![
            (fixture.candidates[0].id, 1),
            (fixture.candidates[1].id, 2),
        ];
        expected.sort();
        assert_eq!(stored, expected);
    }

    #[rocket::async_test]
    async fn completed_elections_are_tallied_on_first_read() {
        let mut fixture = Fixture::new(Election::ongoing_example(), &["A", "B"], 3).await;
        fixture.cast(0, 1).await;
        fixture.cast(1, 1).await;
        fixture.cast(2, 0).await;
        fixture.close().await;

        let (election, rows) = fixture
            .engine()
            .get_results(fixture.election.id)
            .await
            .unwrap();
        assert_eq!(election.status(), ElectionStatus::Completed);
        assert_eq!(totals(&rows), vec![1, 2]);
        assert_eq!(get_winner(&rows), Winner::Single(rows[1].clone()));
    }

    #[rocket::async_test]
    async fn election_without_votes_has_no_winner() {
        let mut fixture = Fixture::new(Election::ongoing_example(), &["D"], 0).await;
        fixture.close().await;

        let (_, rows) = fixture
            .engine()
            .get_results(fixture.election.id)
            .await
            .unwrap();
        assert_eq!(totals(&rows), vec![0]);
        assert_eq!(get_winner(&rows), Winner::Undetermined);
    }

    #[rocket::async_test]
    async fn withdrawn_candidates_lose_their_rows() {
        let fixture = Fixture::new(Election::ongoing_example(), &["A", "B"], 1).await;
        fixture.cast(0, 0).await;
        let engine = fixture.engine();
        engine.calculate_results(fixture.election.id).await.unwrap();

        fixture.store.remove_candidate(fixture.candidates[1].id).await;
        let rows = engine.calculate_results(fixture.election.id).await.unwrap();

        assert_eq!(rows.len(), 1);
        let stored = fixture.store.results(fixture.election.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].candidate, fixture.candidates[0].id);
    }

    #[rocket::async_test]
    async fn orphaned_votes_fail_without_publishing() {
        let fixture = Fixture::new(Election::ongoing_example(), &["A", "B"], 1).await;
        fixture.cast(0, 1).await;
        fixture.store.remove_candidate(fixture.candidates[1].id).await;

        let err = fixture
            .engine()
            .calculate_results(fixture.election.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageError);
        assert!(fixture
            .store
            .results(fixture.election.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[backend_test]
    async fn concurrent_calculations_publish_one_row_per_candidate(store: Arc<MemoryStore>) {
        let fixture =
            Fixture::with_store(store, Election::ongoing_example(), &["A", "B", "C"], 12).await;
        let election = fixture.election.id;
        let engine = fixture.engine();
        let casting = fixture.casting();

        let mut tasks = Vec::new();
        for (i, voter) in fixture.voters.iter().enumerate() {
            let casting = casting.clone();
            let (voter, candidate) = (voter.id, fixture.candidates[i % 3].id);
            tasks.push(spawn(async move {
                casting.cast_vote(voter, election, candidate).await.map(|_| ())
            }));
            if i % 3 == 0 {
                let engine = engine.clone();
                tasks.push(spawn(async move {
                    engine.calculate_results(election).await.map(|_| ())
                }));
            }
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = fixture.store.results(election).await.unwrap();
        let unique: HashSet<Id> = stored.iter().map(|r| r.candidate).collect();
        assert_eq!(stored.len(), 3);
        assert_eq!(unique.len(), 3);

        let (_, rows) = engine.get_results(election).await.unwrap();
        assert_eq!(totals(&rows), vec![4, 4, 4]);
        assert_eq!(
            rows.iter().map(|r| r.total_votes).sum::<u64>(),
            fixture.store.count_by_election(election).await.unwrap()
        );
    }

    #[rocket::async_test]
    async fn unknown_election_is_not_found() {
        let fixture = Fixture::new(Election::ongoing_example(), &["A"], 0).await;
        let engine = fixture.engine();
        let err = engine.calculate_results(Id::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = engine.get_results(Id::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[rocket::async_test]
    async fn reconciliation_repairs_drifted_counters() {
        let fixture = Fixture::new(Election::ongoing_example(), &["A", "B"], 2).await;
        fixture.cast(0, 0).await;
        fixture.cast(1, 0).await;
        // Simulate drift by overwriting the cached counters directly.
        let drifted = Tally::from([(fixture.candidates[0].id, 5), (fixture.candidates[1].id, 0)]);
        fixture.store.set_candidate_counters(&drifted).await.unwrap();

        let engine = fixture.engine();
        let corrected = engine
            .reconcile_counters(fixture.election.id)
            .await
            .unwrap();
        assert_eq!(
            corrected,
            vec![CounterCorrection {
                candidate: fixture.candidates[0].id,
                cached: 5,
                actual: 2,
            }]
        );
        let candidate = fixture
            .store
            .candidate(fixture.candidates[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.votes, 2);

        assert!(engine
            .reconcile_counters(fixture.election.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[rocket::async_test]
    async fn results_only_count_this_election() {
        let first = Fixture::new(Election::ongoing_example(), &["A"], 1).await;
        let second =
            Fixture::with_store(first.store.clone(), Election::ongoing_example(), &["X"], 0).await;
        first.cast(0, 0).await;
        let stray = Vote::new(
            second.election.id,
            second.candidates[0].id,
            first.voters[0].id,
            None,
        );
        first.store.append(&stray).await.unwrap();

        let rows = first
            .engine()
            .calculate_results(first.election.id)
            .await
            .unwrap();
        assert_eq!(totals(&rows), vec![1]);
    }
}
