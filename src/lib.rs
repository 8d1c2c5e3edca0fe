#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;
pub mod store;
pub mod tally_runner;

use config::ConfigFairing;
use logging::LoggerFairing;
use store::Store;
use tally_runner::TallyRunnerFairing;

/// Assemble the server with a fresh, empty store.
pub fn build() -> Rocket<Build> {
    build_with_store(Store::new())
}

/// Assemble the server around an existing store. The tally runner fairing
/// re-schedules tallies for any season the store reports as concluding,
/// so a tally interrupted by a restart is picked up again here.
pub fn build_with_store(store: Store) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(store)
        .attach(TallyRunnerFairing)
}
