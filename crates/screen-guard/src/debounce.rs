//! Debounce state machines
//!
//! Pure tick functions behind the watcher and the monitor. Elapsed time is
//! the wall-clock delta between ticks, not the nominal poll period, so a
//! late tick counts for what it actually covered.

use std::time::Duration;
use tokio::time::Instant;

/// Inputs the watcher samples each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherSample {
    pub detection_enabled: bool,
    pub camera_bound: bool,
    pub attending: bool,
}

/// What the watcher should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherDecision {
    /// Detection off or no camera; nothing accumulates
    Paused,
    /// User is looking; the streak was cleared
    Attending,
    /// Not looking for this long so far
    Accumulating(Duration),
    /// Threshold reached; fires once and the streak restarts from zero
    Engage,
}

/// Tracks continuous not-looking time
#[derive(Debug, Default)]
pub struct NotLookingDebounce {
    continuous_not_look: Duration,
    last_tick: Option<Instant>,
}

impl NotLookingDebounce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn continuous_not_look(&self) -> Duration {
        self.continuous_not_look
    }

    pub fn tick(&mut self, now: Instant, sample: WatcherSample, engage_after: Duration) -> WatcherDecision {
        let delta = elapsed_since(self.last_tick, now);

        if !sample.detection_enabled || !sample.camera_bound {
            // The streak restarts once sampling resumes
            self.continuous_not_look = Duration::ZERO;
            self.last_tick = None;
            return WatcherDecision::Paused;
        }
        self.last_tick = Some(now);

        if sample.attending {
            self.continuous_not_look = Duration::ZERO;
            return WatcherDecision::Attending;
        }

        self.continuous_not_look += delta;
        if self.continuous_not_look >= engage_after {
            self.continuous_not_look = Duration::ZERO;
            WatcherDecision::Engage
        } else {
            WatcherDecision::Accumulating(self.continuous_not_look)
        }
    }
}

/// What the monitor should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorDecision {
    /// Keep protection up; attending for this long so far
    Hold(Duration),
    Disengage,
}

/// Tracks continuous looking time while protection is engaged
#[derive(Debug, Default)]
pub struct LookingDwell {
    continuous_look: Duration,
    last_tick: Option<Instant>,
}

impl LookingDwell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn continuous_look(&self) -> Duration {
        self.continuous_look
    }

    /// Start the dwell over, e.g. after a failed teardown
    pub fn reset(&mut self) {
        self.continuous_look = Duration::ZERO;
    }

    pub fn tick(&mut self, now: Instant, attending: bool, camera_bound: bool, disengage_after: Duration) -> MonitorDecision {
        let delta = elapsed_since(self.last_tick, now);

        if !camera_bound {
            // No fresh data, so nothing counts toward disengaging
            self.continuous_look = Duration::ZERO;
            self.last_tick = None;
            return MonitorDecision::Hold(Duration::ZERO);
        }
        self.last_tick = Some(now);

        if attending {
            self.continuous_look += delta;
        } else {
            self.continuous_look = Duration::ZERO;
        }

        if self.continuous_look >= disengage_after {
            MonitorDecision::Disengage
        } else {
            MonitorDecision::Hold(self.continuous_look)
        }
    }
}

fn elapsed_since(last: Option<Instant>, now: Instant) -> Duration {
    last.map(|t| now.saturating_duration_since(t)).unwrap_or_default()
}
