//! Screen protection
//!
//! Blacks out the screen once the user has looked away long enough and
//! restores it once they have looked back long enough:
//! - [`SampleWatcher`] polls the latest gaze signal and engages protection
//! - [`ProtectionTrigger`] brings up an overlay, an in-app fallback or a
//!   device lock, and tears it down again
//! - [`OverlayMonitor`] runs while protection is up and disengages it
//!
//! [`ScreenGuard`] wires the three together.

pub mod audio;
pub mod debounce;
pub mod guard;
pub mod lock;
pub mod monitor;
pub mod overlay;
pub mod state;
pub mod trigger;
pub mod watcher;

pub use audio::{AudioFocus, AudioGrip, NoAudioFocus};
pub use debounce::{LookingDwell, MonitorDecision, NotLookingDebounce, WatcherDecision, WatcherSample};
pub use guard::{GuardCollaborators, ScreenGuard};
pub use lock::DeviceLock;
pub use monitor::OverlayMonitor;
pub use overlay::{OverlayHandle, OverlayStyle, OverlaySurface, WindowKind, DEFAULT_OVERLAY_TIMEOUT};
pub use state::{GuardState, ProtectionState};
pub use trigger::{Engagement, GuardOptions, ProtectionStrategy, ProtectionTrigger};
pub use watcher::SampleWatcher;

use thiserror::Error;

/// Overlay window errors
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Window rejected: {0}")]
    Rejected(String),

    #[error("Overlay thread failed: {0}")]
    Thread(String),
}

/// Device lock errors
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Device admin is not active")]
    NotAdmin,

    #[error("Lock denied: {0}")]
    Denied(String),
}

/// Guard controller errors
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("No async runtime available: {0}")]
    Runtime(String),
}
