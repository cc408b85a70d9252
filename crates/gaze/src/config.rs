//! Gaze thresholds
//!
//! [`Thresholds`] is a plain snapshot; [`ThresholdConfig`] is the live copy
//! shared between the settings writer and the analyzer and guard loops.
//! Every field is its own atomic, so readers never see a torn value and
//! nobody takes a lock.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// `f32` stored as bits in an [`AtomicU32`]
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Gaze and timing thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Maximum |yaw| (left-right head rotation) in degrees
    pub yaw_degrees: f32,

    /// Maximum |pitch| (up-down head tilt) in degrees
    pub pitch_degrees: f32,

    /// Both eyes must be open with probability above this
    pub eye_open_probability: f32,

    /// Minimum face width as a fraction of the upright frame width
    pub min_face_size: f32,

    /// Continuous not-attending time before protection engages (milliseconds)
    pub engage_after_ms: u64,

    /// Continuous attending time before protection disengages (milliseconds)
    pub disengage_after_ms: u64,

    /// Watcher and monitor tick period (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            yaw_degrees: 20.0,
            pitch_degrees: 20.0,
            eye_open_probability: 0.6,
            min_face_size: 0.4,
            engage_after_ms: 1000,
            disengage_after_ms: 1000,
            poll_interval_ms: 250,
        }
    }
}

impl Thresholds {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Live thresholds, single writer and many readers
#[derive(Debug)]
pub struct ThresholdConfig {
    yaw_degrees: AtomicF32,
    pitch_degrees: AtomicF32,
    eye_open_probability: AtomicF32,
    min_face_size: AtomicF32,
    engage_after_ms: AtomicU64,
    disengage_after_ms: AtomicU64,
    poll_interval_ms: AtomicU64,
}

impl ThresholdConfig {
    pub fn new(initial: Thresholds) -> Self {
        Self {
            yaw_degrees: AtomicF32::new(initial.yaw_degrees),
            pitch_degrees: AtomicF32::new(initial.pitch_degrees),
            eye_open_probability: AtomicF32::new(initial.eye_open_probability),
            min_face_size: AtomicF32::new(initial.min_face_size),
            engage_after_ms: AtomicU64::new(initial.engage_after_ms),
            disengage_after_ms: AtomicU64::new(initial.disengage_after_ms),
            poll_interval_ms: AtomicU64::new(initial.poll_interval_ms),
        }
    }

    /// Copy of the current values
    pub fn snapshot(&self) -> Thresholds {
        Thresholds {
            yaw_degrees: self.yaw_degrees.load(),
            pitch_degrees: self.pitch_degrees.load(),
            eye_open_probability: self.eye_open_probability.load(),
            min_face_size: self.min_face_size.load(),
            engage_after_ms: self.engage_after_ms.load(Ordering::Relaxed),
            disengage_after_ms: self.disengage_after_ms.load(Ordering::Relaxed),
            poll_interval_ms: self.poll_interval_ms.load(Ordering::Relaxed),
        }
    }

    /// Overwrite every field
    pub fn apply(&self, thresholds: &Thresholds) {
        self.yaw_degrees.store(thresholds.yaw_degrees);
        self.pitch_degrees.store(thresholds.pitch_degrees);
        self.eye_open_probability.store(thresholds.eye_open_probability);
        self.min_face_size.store(thresholds.min_face_size);
        self.engage_after_ms.store(thresholds.engage_after_ms, Ordering::Relaxed);
        self.disengage_after_ms.store(thresholds.disengage_after_ms, Ordering::Relaxed);
        self.poll_interval_ms.store(thresholds.poll_interval_ms, Ordering::Relaxed);
    }

    pub fn set_yaw_degrees(&self, value: f32) {
        self.yaw_degrees.store(value);
    }

    pub fn set_pitch_degrees(&self, value: f32) {
        self.pitch_degrees.store(value);
    }

    pub fn engage_after(&self) -> Duration {
        Duration::from_millis(self.engage_after_ms.load(Ordering::Relaxed))
    }

    pub fn disengage_after(&self) -> Duration {
        Duration::from_millis(self.disengage_after_ms.load(Ordering::Relaxed))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.load(Ordering::Relaxed).max(1))
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}
