//! Watcher Service
//!
//! Long-running service that keeps the screen guarded while enabled. Loads
//! settings, binds the front camera, runs gaze analysis and drives the
//! screen guard; the running flag is observable by any UI layer.

mod service;
mod status;

pub use service::{ServiceCollaborators, WatcherService};
pub use status::RunningState;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Settings error: {0}")]
    Settings(#[from] settings::SettingsError),

    #[error("Guard error: {0}")]
    Guard(#[from] screen_guard::GuardError),

    #[error("Service is not running")]
    NotRunning,

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Install the global tracing subscriber. Call once from the host.
pub fn init_logging() -> Result<(), ServiceError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| ServiceError::Logging(e.to_string()))
}
