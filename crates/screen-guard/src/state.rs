//! Shared guard state
//!
//! All cross-thread flags live here behind atomics. Camera and UI code only
//! flip `camera_bound` / `detection_enabled`; the protection state is
//! written by the trigger alone.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio::sync::watch;

/// Current protection mechanism.
///
/// A single value, so "system overlay active" and "fallback active" are
/// mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProtectionState {
    #[default]
    Disengaged = 0,
    /// System-level overlay window is up
    Overlay = 1,
    /// In-app blackout, drawn by the UI layer
    Fallback = 2,
    /// Device was locked through the admin capability
    Locked = 3,
}

impl ProtectionState {
    pub fn is_engaged(self) -> bool {
        self != ProtectionState::Disengaged
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProtectionState::Disengaged => "disengaged",
            ProtectionState::Overlay => "overlay",
            ProtectionState::Fallback => "fallback",
            ProtectionState::Locked => "locked",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ProtectionState::Overlay,
            2 => ProtectionState::Fallback,
            3 => ProtectionState::Locked,
            _ => ProtectionState::Disengaged,
        }
    }
}

/// Flags shared by the watcher, the monitor, the camera callback and the UI
#[derive(Debug)]
pub struct GuardState {
    protection: AtomicU8,
    camera_bound: AtomicBool,
    detection_enabled: AtomicBool,
    changes: watch::Sender<ProtectionState>,
}

impl GuardState {
    pub fn new() -> Self {
        let (changes, _rx) = watch::channel(ProtectionState::Disengaged);
        Self {
            protection: AtomicU8::new(ProtectionState::Disengaged as u8),
            camera_bound: AtomicBool::new(false),
            detection_enabled: AtomicBool::new(false),
            changes,
        }
    }

    pub fn protection(&self) -> ProtectionState {
        ProtectionState::from_u8(self.protection.load(Ordering::Acquire))
    }

    pub(crate) fn set_protection(&self, state: ProtectionState) {
        self.protection.store(state as u8, Ordering::Release);
        self.changes.send_replace(state);
    }

    /// System overlay is showing
    pub fn overlay_active(&self) -> bool {
        self.protection() == ProtectionState::Overlay
    }

    /// UI layer should draw its own blackout
    pub fn fallback_active(&self) -> bool {
        self.protection() == ProtectionState::Fallback
    }

    pub fn camera_bound(&self) -> bool {
        self.camera_bound.load(Ordering::Acquire)
    }

    pub fn set_camera_bound(&self, bound: bool) {
        self.camera_bound.store(bound, Ordering::Release);
    }

    pub fn detection_enabled(&self) -> bool {
        self.detection_enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_detection_enabled(&self, enabled: bool) {
        self.detection_enabled.store(enabled, Ordering::Release);
    }

    /// Observe protection changes (e.g. to draw the fallback blackout)
    pub fn subscribe(&self) -> watch::Receiver<ProtectionState> {
        self.changes.subscribe()
    }
}

impl Default for GuardState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_exclusive() {
        let state = GuardState::new();
        for s in [
            ProtectionState::Disengaged,
            ProtectionState::Overlay,
            ProtectionState::Fallback,
            ProtectionState::Locked,
        ] {
            state.set_protection(s);
            assert_eq!(state.protection(), s);
            assert!(!(state.overlay_active() && state.fallback_active()));
        }
    }

    #[test]
    fn test_subscriber_sees_latest() {
        let state = GuardState::new();
        let rx = state.subscribe();
        state.set_protection(ProtectionState::Fallback);
        assert_eq!(*rx.borrow(), ProtectionState::Fallback);
    }
}
