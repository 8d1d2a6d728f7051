use chrono::Duration;
use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::store::{MemoryStore, MongoStore, Stores};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign and verify JWTs.
    /// Shared with the identity provider that issues voter and admin tokens.
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

/// Configuration for the storage backend.
#[derive(Deserialize)]
struct StoreConfig {
    // secrets
    db_uri: Option<String>,
}

/// A fairing that picks the storage backend and places the resulting
/// [`Stores`] into managed state.
///
/// If `db_uri` is set, this connects to MongoDB and performs any setup
/// necessary; otherwise polls are kept in memory and lost on shutdown.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let Some(db_uri) = config.db_uri else {
            warn!("No `db_uri` configured, polls will be kept in memory only");
            rocket = rocket.manage(Stores::new(MemoryStore::default()));
            return Ok(rocket);
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
        let db = client.database(&get_database_name());

        // Ensure the required indexes and ID counters exist.
        let store = match MongoStore::new(&db).await {
            Ok(store) => store,
            Err(e) => {
                error!("Failed to set up database: {e}");
                return Err(rocket);
            }
        };
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(Stores::new(store));
        Ok(rocket)
    }
}

/// Get the name of the database to use.
fn get_database_name() -> String {
    "polls".to_string()
}
