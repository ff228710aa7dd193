//! The voting core: casting votes, tallying them and picking winners.

use std::sync::Arc;

use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};

use crate::{config::Config, store::SharedStore};

pub mod cache;
pub mod casting;
pub mod scheduler;
pub mod tally;
pub mod winner;

use cache::ResultsCache;
use casting::CastingService;
use tally::TallyEngine;

/// A fairing that builds the voting services over the managed storage
/// handle and places a `CastingService` and a `TallyEngine` into managed
/// state. Both share one results cache.
/// This fairing depends on the config and the storage handle being
/// available in managed state, and so must be attached after those fairings.
pub struct VotingFairing;

#[rocket::async_trait]
impl Fairing for VotingFairing {
    fn info(&self) -> Info {
        Info {
            name: "Voting",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let ttl = match rocket.state::<Config>() {
            Some(config) => config.results_cache_ttl(),
            None => {
                error!("Config was not available when building voting services");
                return Err(rocket);
            }
        };
        let store = match rocket.state::<SharedStore>() {
            Some(store) => store.clone(),
            None => {
                error!("Storage was not available when building voting services");
                return Err(rocket);
            }
        };

        let cache = Arc::new(ResultsCache::new(ttl));
        let casting = CastingService::new(store.clone(), cache.clone());
        let engine = TallyEngine::new(store, cache);
        Ok(rocket.manage(casting).manage(engine))
    }
}

/// A populated store and the services over it, for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::{
        db::{candidate::Candidate, election::Election, user::User, vote::Vote},
        mongodb::Id,
    };
    use crate::store::MemoryStore;

    pub struct Fixture {
        pub store: Arc<MemoryStore>,
        pub cache: Arc<ResultsCache>,
        pub election: Election,
        pub candidates: Vec<Candidate>,
        pub voters: Vec<User>,
    }

    impl Fixture {
        pub async fn new(election: Election, names: &[&str], voters: usize) -> Self {
            Self::with_store(Arc::new(MemoryStore::new()), election, names, voters).await
        }

        /// Populate an existing store with the election, one candidate per
        /// name, and `voters` voters split across two departments.
        pub async fn with_store(
            store: Arc<MemoryStore>,
            election: Election,
            names: &[&str],
            voters: usize,
        ) -> Self {
            store.insert_election(election.clone()).await;

            let mut candidates = Vec::new();
            for name in names {
                let candidate = Candidate::example(name, election.id);
                store.insert_candidate(candidate.clone()).await;
                candidates.push(candidate);
            }

            let departments = [Id::new(), Id::new()];
            let mut users = Vec::new();
            for i in 0..voters {
                let user = User::example(&format!("Voter{i}"), departments[i % 2]);
                store.insert_user(user.clone()).await;
                users.push(user);
            }

            Self {
                store,
                cache: Arc::new(ResultsCache::new(Duration::seconds(30))),
                election,
                candidates,
                voters: users,
            }
        }

        pub fn shared(&self) -> SharedStore {
            self.store.clone()
        }

        pub fn casting(&self) -> CastingService {
            CastingService::new(self.shared(), self.cache.clone())
        }

        pub fn engine(&self) -> TallyEngine {
            TallyEngine::new(self.shared(), self.cache.clone())
        }

        /// Cast a vote from the `voter`th voter for the `candidate`th candidate.
        pub async fn cast(&self, voter: usize, candidate: usize) -> Vote {
            self.casting()
                .cast_vote(
                    self.voters[voter].id,
                    self.election.id,
                    self.candidates[candidate].id,
                )
                .await
                .unwrap()
        }

        /// Close the voting window.
        pub async fn close(&mut self) {
            self.election.end_date = Utc::now() - Duration::seconds(1);
            self.store.insert_election(self.election.clone()).await;
        }
    }
}
