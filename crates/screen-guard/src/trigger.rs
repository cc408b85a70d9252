//! Protection trigger
//!
//! Engages the strongest available mechanism and tears it down again.
//! Transitions are serialised, so engage and disengage never interleave.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::audio::AudioGrip;
use crate::lock::DeviceLock;
use crate::overlay::{OverlayHandle, OverlayStyle, DEFAULT_OVERLAY_TIMEOUT};
use crate::state::{GuardState, ProtectionState};

/// Mechanism used when the user stops looking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionStrategy {
    /// Black system overlay, in-app blackout if that fails
    #[default]
    Overlay,
    /// Device-admin lock, overlay path if the lock is unavailable
    DeviceLock,
}

/// Options read at engage time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardOptions {
    pub strategy: ProtectionStrategy,
    /// Hold transient audio focus while engaged
    pub pause_media: bool,
    /// Overlay opacity, 0.0..=1.0
    pub overlay_opacity: f32,
    /// Wait for an overlay show/hide before treating it as failed
    pub overlay_timeout: Duration,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            strategy: ProtectionStrategy::Overlay,
            pause_media: true,
            overlay_opacity: 1.0,
            overlay_timeout: DEFAULT_OVERLAY_TIMEOUT,
        }
    }
}

impl GuardOptions {
    fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            opacity: self.overlay_opacity,
            focusable: self.pause_media,
        }
    }
}

/// Result of an engage request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    /// Protection was already up; nothing was done
    AlreadyEngaged(ProtectionState),
    /// Protection is now up with this mechanism
    Engaged(ProtectionState),
    /// Detection is switched off; nothing was done
    Suppressed,
}

/// Owns every protection transition
pub struct ProtectionTrigger {
    state: Arc<GuardState>,
    overlay: OverlayHandle,
    audio: AudioGrip,
    lock: Option<Arc<dyn DeviceLock>>,
    options: RwLock<GuardOptions>,
    transition: Mutex<()>,
}

impl ProtectionTrigger {
    pub fn new(
        state: Arc<GuardState>,
        overlay: OverlayHandle,
        audio: AudioGrip,
        lock: Option<Arc<dyn DeviceLock>>,
        options: GuardOptions,
    ) -> Self {
        Self {
            state,
            overlay,
            audio,
            lock,
            options: RwLock::new(options),
            transition: Mutex::new(()),
        }
    }

    pub fn options(&self) -> GuardOptions {
        match self.options.read() {
            Ok(options) => *options,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_options(&self, options: GuardOptions) {
        match self.options.write() {
            Ok(mut current) => *current = options,
            Err(poisoned) => *poisoned.into_inner() = options,
        }
    }

    /// Engage protection. A no-op while already engaged or while detection
    /// is switched off.
    pub async fn engage(&self) -> Engagement {
        let _transition = self.transition.lock().await;

        // Checked under the transition lock, so a concurrent teardown wins
        if !self.state.detection_enabled() {
            debug!("Detection disabled, not engaging");
            return Engagement::Suppressed;
        }

        let current = self.state.protection();
        if current.is_engaged() {
            debug!("Protection already engaged ({})", current.as_str());
            return Engagement::AlreadyEngaged(current);
        }

        let options = self.options();
        let next = match options.strategy {
            ProtectionStrategy::DeviceLock if self.lock_device() => ProtectionState::Locked,
            _ => self.show_overlay(&options).await,
        };

        self.state.set_protection(next);
        if options.pause_media {
            self.audio.acquire();
        }

        metrics::counter!("screen_guard_engagements_total", "mechanism" => next.as_str()).increment(1);
        info!("Protection engaged via {}", next.as_str());
        Engagement::Engaged(next)
    }

    /// Disengage protection and return the resulting state.
    ///
    /// If the overlay cannot be removed the state becomes `Fallback`: the
    /// screen may still be covered, so protection stays engaged.
    pub async fn disengage(&self) -> ProtectionState {
        let _transition = self.transition.lock().await;

        let current = self.state.protection();
        let next = match current {
            ProtectionState::Disengaged => return ProtectionState::Disengaged,
            ProtectionState::Overlay => {
                if self.overlay.hide(self.options().overlay_timeout).await {
                    ProtectionState::Disengaged
                } else {
                    metrics::counter!("screen_guard_overlay_failures_total", "op" => "hide").increment(1);
                    error!("Overlay removal failed, assuming the screen is still covered");
                    ProtectionState::Fallback
                }
            }
            ProtectionState::Fallback => {
                // A window may be left over from a failed removal
                if self.overlay.hide(self.options().overlay_timeout).await {
                    ProtectionState::Disengaged
                } else {
                    metrics::counter!("screen_guard_overlay_failures_total", "op" => "hide").increment(1);
                    error!("Leftover overlay could not be removed, keeping fallback");
                    ProtectionState::Fallback
                }
            }
            ProtectionState::Locked => ProtectionState::Disengaged,
        };

        self.state.set_protection(next);
        if next == ProtectionState::Disengaged {
            self.audio.release();
            metrics::counter!("screen_guard_disengagements_total").increment(1);
            info!("Protection disengaged (was {})", current.as_str());
        }
        next
    }

    /// Unconditional teardown to the disengaged baseline
    pub async fn reset(&self) {
        let _transition = self.transition.lock().await;

        if !self.overlay.hide(self.options().overlay_timeout).await {
            warn!("Overlay removal failed during reset");
        }
        self.audio.release();
        if self.state.protection().is_engaged() {
            info!("Protection reset from {}", self.state.protection().as_str());
        }
        self.state.set_protection(ProtectionState::Disengaged);
    }

    /// Whether the audio grip is currently held
    pub fn holds_audio(&self) -> bool {
        self.audio.is_held()
    }

    async fn show_overlay(&self, options: &GuardOptions) -> ProtectionState {
        if !self.overlay.has_permission(options.overlay_timeout).await {
            info!("No overlay permission, using in-app fallback");
            return ProtectionState::Fallback;
        }

        if self.overlay.show(options.overlay_style(), options.overlay_timeout).await {
            ProtectionState::Overlay
        } else {
            metrics::counter!("screen_guard_overlay_failures_total", "op" => "show").increment(1);
            warn!("Overlay could not be shown, using in-app fallback");
            ProtectionState::Fallback
        }
    }

    fn lock_device(&self) -> bool {
        let Some(lock) = &self.lock else {
            warn!("Device lock selected but no lock is available");
            return false;
        };
        if !lock.is_admin_active() {
            warn!("Device admin not granted, falling back to overlay");
            return false;
        }
        match lock.lock_now() {
            Ok(()) => true,
            Err(e) => {
                error!("Device lock failed: {}", e);
                false
            }
        }
    }
}
