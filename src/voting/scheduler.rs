use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::{self, sync::Mutex, task::JoinHandle},
    Build, Rocket,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{db::election::Election, mongodb::Id},
    store::SharedStore,
};

use super::tally::TallyEngine;

/// Map from election IDs to the pending tally task and its ticket.
type TaskMap = HashMap<Id, (u64, JoinHandle<()>)>;

/// Tallies each election once its voting window closes.
pub struct TallyScheduler {
    engine: TallyEngine,
    retry_interval: Duration,
    tasks: Arc<Mutex<TaskMap>>,
    next_ticket: AtomicU64,
}

impl TallyScheduler {
    pub fn new(engine: TallyEngine, retry_interval: Duration) -> Self {
        Self {
            engine,
            retry_interval: retry_interval.max(Duration::seconds(1)),
            tasks: Default::default(),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Does the given election have a tally pending?
    pub async fn has_pending(&self, election: Id) -> bool {
        self.tasks.lock().await.contains_key(&election)
    }

    /// Schedule a tally for every known election.
    pub async fn schedule_elections(&self, store: &SharedStore) -> Result<()> {
        for election in store.elections().await? {
            self.schedule_election(&election).await;
        }
        Ok(())
    }

    /// Schedule a tally at the end of the given election, replacing any
    /// previously scheduled one. Elections already over are tallied now.
    pub async fn schedule_election(&self, election: &Election) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        // Held across the spawn so the task cannot deregister before it is registered.
        let mut tasks = self.tasks.lock().await;
        let handle = tokio::spawn(Self::run(
            election.id,
            election.end_date,
            ticket,
            self.engine.clone(),
            self.retry_interval,
            self.tasks.clone(),
        ));
        if let Some((_, previous)) = tasks.insert(election.id, (ticket, handle)) {
            previous.abort();
            debug!("Rescheduled tally for election {}", election.id);
        }
    }

    async fn run(
        election: Id,
        at: DateTime<Utc>,
        ticket: u64,
        engine: TallyEngine,
        retry_interval: Duration,
        tasks: Arc<Mutex<TaskMap>>,
    ) {
        tokio::time::sleep(until(at)).await;
        loop {
            debug!("Running scheduled tally for election {election}");
            match engine.calculate_results(election).await {
                Ok(_) => break,
                Err(Error::NotFound(_)) => {
                    warn!("Election {election} disappeared before its scheduled tally");
                    break;
                }
                Err(e) => {
                    error!("Scheduled tally for election {election} failed: {e}");
                    warn!(
                        "Failed tally will be retried in {} seconds",
                        retry_interval.num_seconds()
                    );
                    tokio::time::sleep(until(Utc::now() + retry_interval)).await;
                }
            }
        }

        let mut tasks = tasks.lock().await;
        if matches!(tasks.get(&election), Some((current, _)) if *current == ticket) {
            tasks.remove(&election);
            trace!("Tally for election {election} completed; removed self from list");
        }
    }
}

/// Time left until `at`, or zero if it has passed.
fn until(at: DateTime<Utc>) -> std::time::Duration {
    (at - Utc::now()).to_std().unwrap_or_default()
}

/// A fairing that schedules tallies for all elections during Rocket
/// ignition, and places a `TallyScheduler` into managed state.
/// This fairing depends on the storage handle and the config being in
/// managed state, and so must be attached after the fairings providing them.
pub struct TallySchedulerFairing;

#[rocket::async_trait]
impl Fairing for TallySchedulerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Tally Scheduler",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        info!("Scheduling election tallies...");
        let (Some(engine), Some(config), Some(store)) = (
            rocket.state::<TallyEngine>(),
            rocket.state::<Config>(),
            rocket.state::<SharedStore>(),
        ) else {
            error!("Voting services were not available when scheduling tallies");
            return Err(rocket);
        };
        let scheduler = TallyScheduler::new(engine.clone(), config.tally_retry_interval());
        if let Err(e) = scheduler.schedule_elections(store).await {
            error!("Failed to schedule election tallies: {e}");
            return Err(rocket);
        }
        info!("...election tallies scheduled!");

        rocket = rocket.manage(scheduler);
        Ok(rocket)
    }
}
