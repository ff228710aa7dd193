use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rocket::tokio::sync::Mutex;

use crate::model::{common::results::ResultRow, mongodb::Id};

/// A time-bounded cache of per-election results.
///
/// Every write affecting an election must call [`ResultsCache::invalidate`].
/// Readers take a [`Ticket`] before loading from storage and hand it back
/// with the loaded rows; if an invalidation happened in between, the rows
/// are discarded instead of cached.
pub struct ResultsCache {
    ttl: Duration,
    entries: Mutex<HashMap<Id, Entry>>,
}

#[derive(Default)]
struct Entry {
    generation: u64,
    cached: Option<(Vec<ResultRow>, DateTime<Utc>)>,
}

/// Proof of which cache generation a read started from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ticket(u64);

impl ResultsCache {
    /// A cache holding entries for `ttl`. A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up fresh results, or get a ticket for loading them.
    pub async fn get(&self, election: Id) -> Result<Vec<ResultRow>, Ticket> {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(election).or_default();
        match entry.cached {
            Some((ref rows, expires_at)) if Utc::now() < expires_at => Ok(rows.clone()),
            _ => {
                entry.cached = None;
                Err(Ticket(entry.generation))
            }
        }
    }

    /// Store loaded results, unless the election was invalidated since
    /// `ticket` was issued.
    pub async fn put(&self, election: Id, ticket: Ticket, rows: Vec<ResultRow>) {
        if self.ttl <= Duration::zero() {
            return;
        }
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(election).or_default();
        if entry.generation == ticket.0 {
            entry.cached = Some((rows, Utc::now() + self.ttl));
        } else {
            trace!("Discarding results for {election} loaded before an invalidation");
        }
    }

    /// Drop any cached results for the election.
    pub async fn invalidate(&self, election: Id) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(election).or_default();
        entry.generation += 1;
        entry.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<ResultRow> {
        vec![ResultRow {
            candidate: Id::new(),
            name: "A".to_string(),
            total_votes: 1,
        }]
    }

    #[rocket::async_test]
    async fn serves_until_invalidated() {
        let cache = ResultsCache::new(Duration::seconds(60));
        let election = Id::new();

        let ticket = cache.get(election).await.unwrap_err();
        cache.put(election, ticket, rows()).await;
        assert!(cache.get(election).await.is_ok());

        cache.invalidate(election).await;
        assert!(cache.get(election).await.is_err());
    }

    #[rocket::async_test]
    async fn discards_loads_that_raced_an_invalidation() {
        let cache = ResultsCache::new(Duration::seconds(60));
        let election = Id::new();

        let ticket = cache.get(election).await.unwrap_err();
        cache.invalidate(election).await;
        cache.put(election, ticket, rows()).await;
        assert!(cache.get(election).await.is_err());
    }

    #[rocket::async_test]
    async fn zero_ttl_disables_caching() {
        let cache = ResultsCache::new(Duration::zero());
        let election = Id::new();

        let ticket = cache.get(election).await.unwrap_err();
        cache.put(election, ticket, rows()).await;
        assert!(cache.get(election).await.is_err());
    }
}
