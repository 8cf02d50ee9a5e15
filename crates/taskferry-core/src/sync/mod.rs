//! Sync cycle orchestration between the local store and a remote backend.

mod coordinator;
mod cycle;
mod freshness;
#[cfg(test)]
mod test_support;

pub use coordinator::{SyncCoordinator, TriggerOutcome};
pub use cycle::{CycleReport, SyncEngine, SyncOutcome};
pub use freshness::{LocalVersion, Snapshot};
