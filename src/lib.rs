#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use rocket::{Build, Rocket};

use crate::clock::{SharedClock, SystemClock};
use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;
use crate::store::Stores;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::Config;

/// Assemble the server. Config and storage are loaded by fairings on ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .manage::<SharedClock>(Arc::new(SystemClock))
}

/// Assemble the server around already-constructed state, skipping the config
/// and store fairings.
pub fn rocket_with_state(config: Config, stores: Stores, clock: SharedClock) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .manage(config)
        .manage(stores)
        .manage(clock)
}

/// Connect to the database used by `#[backend_test(mongodb)]` tests,
/// taken from `POLLS_TEST_DB_URI`.
#[cfg(test)]
pub(crate) async fn test_db_client() -> mongodb::Client {
    let db_uri = std::env::var("POLLS_TEST_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to test database at {db_uri}: {e}"))
}

/// A fresh database name, so concurrent tests don't interfere.
#[cfg(test)]
pub(crate) fn test_database_name() -> String {
    format!("polls_test_{:08x}", rand::random::<u32>())
}
