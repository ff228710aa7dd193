#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::voting::{scheduler::TallySchedulerFairing, VotingFairing};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;
pub mod voting;

/// Assemble the server. Storage and voting services are set up by fairings
/// during ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(VotingFairing)
        .attach(TallySchedulerFairing)
}

/// A server over the given in-memory store, for tests.
#[cfg(test)]
pub(crate) fn rocket_for_store(
    memory: std::sync::Arc<store::MemoryStore>,
    config: config::Config,
) -> Rocket<Build> {
    let store: store::SharedStore = memory;
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .manage(config)
        .manage(store)
        .attach(VotingFairing)
        .attach(TallySchedulerFairing)
}
