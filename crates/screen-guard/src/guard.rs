//! Guard controller
//!
//! Owns the watcher loop, the monitor and the trigger for one session.

use gaze::{SignalSlot, ThresholdConfig};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audio::{AudioFocus, AudioGrip};
use crate::lock::DeviceLock;
use crate::monitor::OverlayMonitor;
use crate::overlay::OverlayHandle;
use crate::state::{GuardState, ProtectionState};
use crate::trigger::{GuardOptions, ProtectionTrigger};
use crate::watcher::SampleWatcher;
use crate::GuardError;

/// Platform pieces the guard drives
pub struct GuardCollaborators {
    pub overlay: OverlayHandle,
    pub audio: Arc<dyn AudioFocus>,
    pub lock: Option<Arc<dyn DeviceLock>>,
}

type Task = (JoinHandle<()>, CancellationToken);

pub struct ScreenGuard {
    state: Arc<GuardState>,
    trigger: Arc<ProtectionTrigger>,
    monitor: Arc<OverlayMonitor>,
    watcher: Arc<SampleWatcher>,
    watcher_task: Mutex<Option<Task>>,
}

impl ScreenGuard {
    pub fn new(
        signal: SignalSlot,
        thresholds: Arc<ThresholdConfig>,
        collaborators: GuardCollaborators,
        options: GuardOptions,
    ) -> Self {
        let state = Arc::new(GuardState::new());
        let trigger = Arc::new(ProtectionTrigger::new(
            state.clone(),
            collaborators.overlay,
            AudioGrip::new(collaborators.audio),
            collaborators.lock,
            options,
        ));
        let monitor = Arc::new(OverlayMonitor::new(
            state.clone(),
            signal.clone(),
            thresholds.clone(),
            trigger.clone(),
        ));
        let watcher = Arc::new(SampleWatcher::new(
            state.clone(),
            signal,
            thresholds,
            trigger.clone(),
            monitor.clone(),
        ));

        Self {
            state,
            trigger,
            monitor,
            watcher,
            watcher_task: Mutex::new(None),
        }
    }

    /// Enable detection and start the watcher loop. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) -> Result<(), GuardError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| GuardError::Runtime(e.to_string()))?;

        self.state.set_detection_enabled(true);

        let mut task = self.lock_task();
        if task.as_ref().is_some_and(|(handle, _)| !handle.is_finished()) {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let watcher = self.watcher.clone();
        let token = cancel.clone();
        let handle = runtime.spawn(async move { watcher.run(token).await });
        *task = Some((handle, cancel));

        info!("Screen guard started");
        Ok(())
    }

    /// Stop both loops and tear protection down
    pub async fn stop(&self) {
        self.state.set_detection_enabled(false);

        let task = self.lock_task().take();
        if let Some((handle, cancel)) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("Sample watcher ended abnormally: {}", e);
            }
        }

        self.monitor.cancel().await;
        self.trigger.reset().await;
        info!("Screen guard stopped");
    }

    /// Drop whatever protection was up and let the loops decide again
    pub async fn resume(&self) -> Result<(), GuardError> {
        self.monitor.cancel().await;
        self.trigger.reset().await;
        self.start()
    }

    pub fn set_camera_bound(&self, bound: bool) {
        if bound != self.state.camera_bound() {
            info!("Camera {}", if bound { "bound" } else { "unbound" });
        }
        self.state.set_camera_bound(bound);
    }

    /// Toggle detection without stopping the watcher. Turning it off tears
    /// protection down.
    pub async fn set_detection_enabled(&self, enabled: bool) {
        self.state.set_detection_enabled(enabled);
        if !enabled {
            self.monitor.cancel().await;
            self.trigger.reset().await;
        }
    }

    pub fn set_options(&self, options: GuardOptions) {
        self.trigger.set_options(options);
    }

    pub fn options(&self) -> GuardOptions {
        self.trigger.options()
    }

    pub fn state(&self) -> ProtectionState {
        self.state.protection()
    }

    pub fn overlay_active(&self) -> bool {
        self.state.overlay_active()
    }

    pub fn fallback_active(&self) -> bool {
        self.state.fallback_active()
    }

    pub fn is_watching(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|(handle, _)| !handle.is_finished())
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_running()
    }

    /// Observe protection changes
    pub fn subscribe(&self) -> watch::Receiver<ProtectionState> {
        self.state.subscribe()
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<Task>> {
        match self.watcher_task.lock() {
            Ok(task) => task,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
