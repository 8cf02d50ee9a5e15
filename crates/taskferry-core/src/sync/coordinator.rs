//! Keeps at most one sync cycle in flight.
//!
//! Triggers that arrive while a cycle runs are coalesced: the running
//! trigger performs one follow-up cycle once it finishes, however many
//! requests piled up in the meantime.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::cycle::{SyncEngine, SyncOutcome};
use crate::backend::RemoteBackend;
use crate::storage::LocalStore;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// This call ran the cycle (and any follow-up) itself.
    Completed(SyncOutcome),
    /// A cycle was already running; it will run once more for this request.
    Queued,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    in_flight: bool,
    queued: bool,
}

pub struct SyncCoordinator<L, R> {
    engine: SyncEngine<L, R>,
    state: Mutex<CoordinatorState>,
}

impl<L, R> SyncCoordinator<L, R>
where
    L: LocalStore,
    R: RemoteBackend,
{
    pub fn new(engine: SyncEngine<L, R>) -> Self {
        Self {
            engine,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    pub const fn engine(&self) -> &SyncEngine<L, R> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().in_flight
    }

    /// Request a sync.
    ///
    /// Errors are recorded in the local settings before being returned.
    /// When the caller ran a follow-up cycle, the follow-up's result wins.
    pub async fn trigger(&self) -> Result<TriggerOutcome> {
        {
            let mut state = self.lock_state();
            if state.in_flight {
                state.queued = true;
                debug!("sync already running, queued a follow-up cycle");
                return Ok(TriggerOutcome::Queued);
            }
            state.in_flight = true;
        }
        let mut guard = InFlightGuard {
            state: &self.state,
            armed: true,
        };

        let mut result = self.run_once().await;
        loop {
            {
                let mut state = self.lock_state();
                if !state.queued {
                    state.in_flight = false;
                    guard.armed = false;
                    break;
                }
                state.queued = false;
            }
            debug!("running queued follow-up sync cycle");
            result = self.run_once().await;
        }

        result.map(TriggerOutcome::Completed)
    }

    async fn run_once(&self) -> Result<SyncOutcome> {
        let result = self.engine.run_cycle().await;
        if let Err(error) = &result {
            if let Err(record_error) = self.engine.record_failure(error).await {
                warn!(%record_error, "failed to record sync error in local settings");
            }
        }
        result
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the in-flight slot if a trigger is dropped mid-cycle.
struct InFlightGuard<'a> {
    state: &'a Mutex<CoordinatorState>,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_flight = false;
            state.queued = false;
        }
    }
}
