//! User settings
//!
//! Named, persisted settings with defaults. Loaded from an optional JSON
//! file layered under `WATCHER_*` environment variables, clamped into range
//! and converted into the live gaze thresholds and guard options.

mod store;

pub use store::{SettingsStore, ENV_PREFIX};

use gaze::{EyeGate, FaceSelection, GazeClassifier, Thresholds};
use screen_guard::{GuardOptions, ProtectionStrategy, DEFAULT_OVERLAY_TIMEOUT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write settings: {0}")]
    Io(#[from] std::io::Error),
}

const MAX_ANGLE_DEGREES: f32 = 90.0;
const MIN_DELAY_SECS: f32 = 0.1;
const MAX_DELAY_SECS: f32 = 600.0;
const MIN_POLL_MS: u64 = 10;
const MAX_POLL_MS: u64 = 5_000;

/// Everything the user can change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Max |yaw| in degrees that still counts as looking
    pub yaw_threshold: f32,
    /// Max |pitch| in degrees that still counts as looking
    pub pitch_threshold: f32,
    /// Both eyes must be open with more than this probability
    pub eye_open_threshold: f32,
    /// Minimum face width as a fraction of the frame width
    pub min_face_size: f32,
    /// Not-looking time before the screen is blacked out
    pub screen_off_delay_secs: f32,
    /// Looking time before the screen is restored
    pub wake_delay_secs: f32,
    pub poll_interval_ms: u64,
    pub pause_media: bool,
    pub overlay_opacity: f32,
    pub protection: ProtectionStrategy,
    pub face_selection: FaceSelection,
    pub eye_gate: EyeGate,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            yaw_threshold: 20.0,
            pitch_threshold: 20.0,
            eye_open_threshold: 0.6,
            min_face_size: 0.4,
            screen_off_delay_secs: 1.0,
            wake_delay_secs: 1.0,
            poll_interval_ms: 250,
            pause_media: true,
            overlay_opacity: 1.0,
            protection: ProtectionStrategy::Overlay,
            face_selection: FaceSelection::Largest,
            eye_gate: EyeGate::Required,
        }
    }
}

impl Settings {
    /// Pull every value into its valid range; NaN falls back to the default
    pub fn clamped(mut self) -> Self {
        let defaults = Settings::default();
        self.yaw_threshold = clamp(self.yaw_threshold, 0.0, MAX_ANGLE_DEGREES, defaults.yaw_threshold);
        self.pitch_threshold = clamp(self.pitch_threshold, 0.0, MAX_ANGLE_DEGREES, defaults.pitch_threshold);
        self.eye_open_threshold = clamp(self.eye_open_threshold, 0.0, 1.0, defaults.eye_open_threshold);
        self.min_face_size = clamp(self.min_face_size, 0.0, 1.0, defaults.min_face_size);
        self.screen_off_delay_secs = clamp(
            self.screen_off_delay_secs,
            MIN_DELAY_SECS,
            MAX_DELAY_SECS,
            defaults.screen_off_delay_secs,
        );
        self.wake_delay_secs = clamp(self.wake_delay_secs, MIN_DELAY_SECS, MAX_DELAY_SECS, defaults.wake_delay_secs);
        self.poll_interval_ms = self.poll_interval_ms.clamp(MIN_POLL_MS, MAX_POLL_MS);
        self.overlay_opacity = clamp(self.overlay_opacity, 0.0, 1.0, defaults.overlay_opacity);
        self
    }

    /// Gaze sensitivity slider, 0..1. Higher sensitivity means a lower
    /// eye-open threshold.
    pub fn sensitivity(&self) -> f32 {
        1.0 - self.eye_open_threshold
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.eye_open_threshold = 1.0 - clamp(sensitivity, 0.0, 1.0, 1.0 - Settings::default().eye_open_threshold);
    }

    pub fn to_thresholds(&self) -> Thresholds {
        Thresholds {
            yaw_degrees: self.yaw_threshold,
            pitch_degrees: self.pitch_threshold,
            eye_open_probability: self.eye_open_threshold,
            min_face_size: self.min_face_size,
            engage_after_ms: secs_to_ms(self.screen_off_delay_secs),
            disengage_after_ms: secs_to_ms(self.wake_delay_secs),
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    pub fn to_guard_options(&self) -> GuardOptions {
        GuardOptions {
            strategy: self.protection,
            pause_media: self.pause_media,
            overlay_opacity: self.overlay_opacity,
            overlay_timeout: DEFAULT_OVERLAY_TIMEOUT,
        }
    }

    pub fn to_classifier(&self) -> GazeClassifier {
        GazeClassifier::new(self.face_selection, self.eye_gate)
    }
}

fn clamp(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

fn secs_to_ms(secs: f32) -> u64 {
    (secs * 1000.0).round() as u64
}
