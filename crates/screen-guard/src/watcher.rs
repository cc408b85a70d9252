//! Sample watcher
//!
//! Polls the latest gaze verdict and engages protection after continuous
//! not-looking time reaches the engage threshold.

use gaze::{SignalSlot, ThresholdConfig};
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::debounce::{NotLookingDebounce, WatcherDecision, WatcherSample};
use crate::monitor::OverlayMonitor;
use crate::state::GuardState;
use crate::trigger::{Engagement, ProtectionTrigger};

pub struct SampleWatcher {
    state: Arc<GuardState>,
    signal: SignalSlot,
    thresholds: Arc<ThresholdConfig>,
    trigger: Arc<ProtectionTrigger>,
    monitor: Arc<OverlayMonitor>,
}

impl SampleWatcher {
    pub fn new(
        state: Arc<GuardState>,
        signal: SignalSlot,
        thresholds: Arc<ThresholdConfig>,
        trigger: Arc<ProtectionTrigger>,
        monitor: Arc<OverlayMonitor>,
    ) -> Self {
        Self {
            state,
            signal,
            thresholds,
            trigger,
            monitor,
        }
    }

    /// Tick until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Sample watcher started");

        let mut period = self.thresholds.poll_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut debounce = NotLookingDebounce::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let sample = WatcherSample {
                detection_enabled: self.state.detection_enabled(),
                camera_bound: self.state.camera_bound(),
                attending: self.signal.is_attending(),
            };

            match debounce.tick(Instant::now(), sample, self.thresholds.engage_after()) {
                WatcherDecision::Paused => trace!("Watcher paused"),
                WatcherDecision::Accumulating(elapsed) => {
                    trace!("Not looking for {}ms", elapsed.as_millis());
                }
                WatcherDecision::Attending => {
                    // The monitor owns disengaging, it only has to be alive
                    if self.state.protection().is_engaged() {
                        self.monitor.ensure_started();
                    }
                }
                WatcherDecision::Engage => match self.trigger.engage().await {
                    Engagement::Engaged(mechanism) => {
                        debug!("Watcher engaged {}", mechanism.as_str());
                        self.monitor.ensure_started();
                    }
                    Engagement::AlreadyEngaged(_) => self.monitor.ensure_started(),
                    Engagement::Suppressed => debug!("Engage skipped, detection switched off"),
                },
            }

            let next = self.thresholds.poll_interval();
            if next != period {
                debug!("Poll interval changed to {}ms", next.as_millis());
                period = next;
                ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }
        }

        info!("Sample watcher stopped");
    }
}
