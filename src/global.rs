//! # Process-Wide Entry Points
//!
//! An optional convenience layer over the injectable core: a default
//! [`Runner`] slot, a global [`run`] that flushes it, and a singleton
//! [`Configuration`] applied through [`configure`]. The core never
//! consults this module; tests that want isolation construct their own
//! runner and registry.

use std::sync::{OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::runner::Runner;

fn runner_slot() -> &'static RwLock<Option<Runner>> {
    static SLOT: OnceLock<RwLock<Option<Runner>>> = OnceLock::new();
    SLOT.get_or_init(|| RwLock::new(None))
}

/// Install the process-wide default runner. Re-installable, so test
/// binaries can swap runners without wedging on a one-shot static.
pub fn install(runner: Runner) {
    *runner_slot().write().unwrap() = Some(runner);
}

/// The currently installed default runner, if any.
pub fn runner() -> Option<Runner> {
    runner_slot().read().unwrap().clone()
}

/// Run all queued operations on the default runner.
pub async fn run() -> Result<(), Error> {
    match runner() {
        Some(r) => r.start().await,
        None => Err(Error::NoRunner),
    }
}

/// Process-wide settings consumed by transport adapters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

fn config_slot() -> &'static RwLock<Configuration> {
    static SLOT: OnceLock<RwLock<Configuration>> = OnceLock::new();
    SLOT.get_or_init(|| RwLock::new(Configuration::default()))
}

/// Apply a closure to the singleton configuration. Safe to call any
/// number of times; each call sees the accumulated state.
pub fn configure(f: impl FnOnce(&mut Configuration)) {
    f(&mut config_slot().write().unwrap());
}

/// Snapshot of the current configuration.
pub fn configuration() -> Configuration {
    config_slot().read().unwrap().clone()
}
