use std::sync::Arc;

use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::ensure_indexes_exist;
use crate::store::{MemoryStore, MongoStore, SharedStore};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_results_cache_ttl")]
    results_cache_ttl: u32,
    #[serde(default = "default_tally_retry_interval")]
    tally_retry_interval: u32,
    // secrets
    jwt_secret: String,
}

fn default_results_cache_ttl() -> u32 {
    30
}

fn default_tally_retry_interval() -> u32 {
    300
}

impl Config {
    /// How long computed results may be served from cache, in seconds.
    pub fn results_cache_ttl(&self) -> Duration {
        Duration::seconds(self.results_cache_ttl.into())
    }

    /// Delay before a failed scheduled tally is retried, in seconds.
    pub fn tally_retry_interval(&self) -> Duration {
        Duration::seconds(self.tally_retry_interval.into())
    }

    /// Secret key used to verify session JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: Option<String>,
}

fn default_db_name() -> String {
    "votecast".to_string()
}

/// A fairing that loads the database config, connects to MongoDB, ensures
/// the required indexes exist, and places the storage handle into managed
/// state. Without a `db_uri`, an ephemeral in-memory store is used instead.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "Storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let db_uri = match config.db_uri {
            Some(db_uri) => db_uri,
            None => {
                warn!("No `db_uri` configured; votes will be kept in memory only!");
                let store: SharedStore = Arc::new(MemoryStore::new());
                rocket = rocket.manage(store);
                return Ok(rocket);
            }
        };

        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let store: SharedStore = Arc::new(MongoStore::new(client, &db));
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}
