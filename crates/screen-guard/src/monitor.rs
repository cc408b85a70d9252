//! Overlay monitor
//!
//! Runs only while protection is engaged. Disengages once the user has been
//! attending for the dwell threshold with the camera bound.

use gaze::{SignalSlot, ThresholdConfig};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::debounce::{LookingDwell, MonitorDecision};
use crate::state::{GuardState, ProtectionState};
use crate::trigger::ProtectionTrigger;

type Task = (JoinHandle<()>, CancellationToken);

/// At most one monitor loop is alive at a time
pub struct OverlayMonitor {
    state: Arc<GuardState>,
    signal: SignalSlot,
    thresholds: Arc<ThresholdConfig>,
    trigger: Arc<ProtectionTrigger>,
    task: Mutex<Option<Task>>,
}

impl OverlayMonitor {
    pub fn new(
        state: Arc<GuardState>,
        signal: SignalSlot,
        thresholds: Arc<ThresholdConfig>,
        trigger: Arc<ProtectionTrigger>,
    ) -> Self {
        Self {
            state,
            signal,
            thresholds,
            trigger,
            task: Mutex::new(None),
        }
    }

    /// Start the loop unless one is already running
    pub fn ensure_started(self: &Arc<Self>) {
        let mut task = match self.task.lock() {
            Ok(task) => task,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some((handle, _)) = task.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }

        let cancel = CancellationToken::new();
        let monitor = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { monitor.run(token).await });
        *task = Some((handle, cancel));
    }

    pub fn is_running(&self) -> bool {
        match self.task.lock() {
            Ok(task) => task.as_ref().is_some_and(|(handle, _)| !handle.is_finished()),
            Err(poisoned) => poisoned
                .into_inner()
                .as_ref()
                .is_some_and(|(handle, _)| !handle.is_finished()),
        }
    }

    /// Stop the loop and wait for it to exit
    pub async fn cancel(&self) {
        let task = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some((handle, cancel)) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("Overlay monitor ended abnormally: {}", e);
            }
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        info!("Overlay monitor started");

        let mut period = self.thresholds.poll_interval();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut dwell = LookingDwell::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.state.protection().is_engaged() {
                debug!("Protection cleared elsewhere, monitor exiting");
                break;
            }

            let decision = dwell.tick(
                Instant::now(),
                self.signal.is_attending(),
                self.state.camera_bound(),
                self.thresholds.disengage_after(),
            );
            trace!("Monitor tick: {:?}", decision);

            if decision == MonitorDecision::Disengage {
                match self.trigger.disengage().await {
                    ProtectionState::Disengaged => break,
                    other => {
                        warn!("Disengage left protection at {}, retrying after another dwell", other.as_str());
                        dwell.reset();
                    }
                }
            }

            let next = self.thresholds.poll_interval();
            if next != period {
                period = next;
                ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }
        }

        info!("Overlay monitor stopped");
    }
}
