//! Shared runtime state for rg-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The poll loop owns the
//! engine; only its published [`EngineStatus`] crosses into this module.

use std::sync::OnceLock;
use std::time::Instant;

use rg_engine::EngineStatus;
use serde::Serialize;
use tokio::sync::RwLock;

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
pub struct AppState {
    pub build: BuildInfo,
    /// Latest engine status; `None` until the first completed cycle.
    pub status: RwLock<Option<EngineStatus>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            build: BuildInfo {
                service: "rg-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: RwLock::new(None),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Seconds since the process (first caller) started.
pub fn uptime_secs() -> u64 {
    STARTED_AT.get_or_init(Instant::now).elapsed().as_secs()
}
