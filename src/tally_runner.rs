//! Background execution of season tallies.
//!
//! Concluding a season only closes the voting window; the tally itself is
//! a durable job keyed by season id. The season's `Concluding` state
//! doubles as the "job pending" marker, so a tally interrupted by a crash
//! is simply re-run at the next ignition (the tally is idempotent, making
//! at-least-once execution safe).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::future::{BoxFuture, FutureExt},
    tokio::sync::Mutex,
    Build, Rocket,
};

use crate::config::Config;
use crate::error::Error;
use crate::model::season::SeasonId;
use crate::scheduled_task::ScheduledTask;
use crate::store::Store;

/// Map from season IDs to pending tally tasks.
type TaskMap = HashMap<SeasonId, ScheduledTask<Result<(), Error>>>;

/// Tally runners: background tasks that tally concluding seasons and
/// retry on failure.
pub struct TallyRunners {
    tasks: Arc<Mutex<TaskMap>>,
    retry_interval: Duration,
}

impl TallyRunners {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            tasks: Default::default(),
            retry_interval,
        }
    }

    /// Is a tally currently scheduled for the given season?
    pub async fn is_pending(&self, season_id: SeasonId) -> bool {
        self.tasks.lock().await.contains_key(&season_id)
    }

    /// Schedule a tally for every season found in `Concluding` state.
    /// Called at ignition to recover jobs interrupted by a crash.
    pub async fn schedule_pending(&self, store: &Store) {
        for season_id in store.seasons_pending_tally().await {
            warn!("Season {season_id} was left concluding; re-scheduling its tally");
            self.schedule(store.clone(), season_id).await;
        }
    }

    /// Schedule the tally for the given season to run immediately.
    /// If one is already scheduled, it is replaced.
    pub async fn schedule(&self, store: Store, season_id: SeasonId) {
        let runner = Self::runner(store, season_id, self.tasks.clone(), self.retry_interval);
        let mut tasks_locked = self.tasks.lock().await;
        if let Some(task) = tasks_locked.remove(&season_id) {
            let already_completed = task.cancel().await;
            if already_completed {
                // A completed task removes itself before returning, so
                // this path hints that assumptions made elsewhere might
                // be incorrect.
                warn!("schedule: tally for season {season_id} had already completed");
                return;
            }
        }
        let task = ScheduledTask::new(runner, Utc::now());
        tasks_locked.insert(season_id, task);
    }

    /// Wait for the season's tally to complete, triggering it early if it
    /// was scheduled for later (e.g. a pending retry). No-op if nothing
    /// is scheduled or the tally already completed.
    pub async fn wait(&self, season_id: SeasonId) -> Result<(), Error> {
        let mut tasks_locked = self.tasks.lock().await;
        let task = tasks_locked.remove(&season_id);
        drop(tasks_locked); // Avoid deadlock, as the runner needs the lock too.
        match task {
            Some(task) => {
                task.trigger_now();
                task.await.unwrap_or_else(|_| {
                    Err(Error::bad_request(format!(
                        "Tally task for season {season_id} panicked"
                    )))
                })
            }
            None => Ok(()),
        }
    }

    /// The tally job itself. Since a failed run re-schedules itself, this
    /// is a recursive async function and must return a `BoxFuture` to
    /// avoid an infinitely-recursive state machine.
    fn runner(
        store: Store,
        season_id: SeasonId,
        tasks: Arc<Mutex<TaskMap>>,
        retry_interval: Duration,
    ) -> BoxFuture<'static, Result<(), Error>> {
        async move {
            debug!("Running tally for season {season_id}");
            let result = store.run_tally(season_id).await;
            match result {
                Ok(()) => {
                    tasks.lock().await.remove(&season_id);
                    trace!("Tally for season {season_id} completed; removed self from list");
                }
                Err(ref e) => {
                    error!("Tally for season {season_id} failed, season stays concluding: {e}");
                    let retry = Self::runner(
                        store.clone(),
                        season_id,
                        tasks.clone(),
                        retry_interval,
                    );
                    let retry_time = Utc::now() + retry_interval;
                    let mut tasks_locked = tasks.lock().await;
                    tasks_locked.insert(season_id, ScheduledTask::new(retry, retry_time));
                    warn!(
                        "Failed tally will be retried in {} seconds",
                        retry_interval.num_seconds()
                    );
                }
            }
            result
        }
        .boxed()
    }
}

/// A fairing that re-schedules tallies for all seasons left concluding,
/// and places a `TallyRunners` into managed state. Depends on the store
/// and config being in managed state, so it must be attached after them.
pub struct TallyRunnerFairing;

#[rocket::async_trait]
impl Fairing for TallyRunnerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Tally Runners",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let retry_interval = match rocket.state::<Config>() {
            Some(config) => config.tally_retry_interval(),
            None => {
                error!("Config was not available when scheduling tally runners");
                return Err(rocket);
            }
        };
        let store = match rocket.state::<Store>() {
            Some(store) => store.clone(),
            None => {
                error!("Store was not available when scheduling tally runners");
                return Err(rocket);
            }
        };

        let runners = TallyRunners::new(retry_interval);
        runners.schedule_pending(&store).await;

        rocket = rocket.manage(runners);
        Ok(rocket)
    }
}
