//! Watcher service lifecycle

use camera_capture::{CameraConfig, CameraPipeline, LatestFrame};
use gaze::{FaceDetector, FrameAnalyzer, SignalSlot, ThresholdConfig};
use screen_guard::{AudioFocus, DeviceLock, GuardCollaborators, OverlayHandle, ProtectionState, ScreenGuard};
use settings::{Settings, SettingsStore};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::status::RunningState;
use crate::ServiceError;

/// Platform pieces handed to the service
pub struct ServiceCollaborators {
    pub camera: Box<dyn CameraPipeline>,
    pub detector: Arc<dyn FaceDetector>,
    pub overlay: OverlayHandle,
    pub audio: Arc<dyn AudioFocus>,
    pub lock: Option<Arc<dyn DeviceLock>>,
}

struct Session {
    id: Uuid,
    frames: Arc<LatestFrame>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

pub struct WatcherService {
    settings: Arc<SettingsStore>,
    thresholds: Arc<ThresholdConfig>,
    analyzer: Arc<FrameAnalyzer>,
    guard: Arc<ScreenGuard>,
    camera: Mutex<Box<dyn CameraPipeline>>,
    running: RunningState,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl WatcherService {
    pub fn new(settings: Arc<SettingsStore>, collaborators: ServiceCollaborators) -> Self {
        let current = settings.get();
        let thresholds = Arc::new(ThresholdConfig::new(current.to_thresholds()));
        let signal = SignalSlot::new();

        let analyzer = Arc::new(FrameAnalyzer::new(
            collaborators.detector,
            current.to_classifier(),
            thresholds.clone(),
            signal.clone(),
        ));
        let guard = Arc::new(ScreenGuard::new(
            signal,
            thresholds.clone(),
            GuardCollaborators {
                overlay: collaborators.overlay,
                audio: collaborators.audio,
                lock: collaborators.lock,
            },
            current.to_guard_options(),
        ));

        Self {
            settings,
            thresholds,
            analyzer,
            guard,
            camera: Mutex::new(collaborators.camera),
            running: RunningState::new(),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Start watching. A no-op while already running.
    pub async fn start(&self) -> Result<(), ServiceError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            debug!("Watcher service already running");
            return Ok(());
        }

        let id = Uuid::new_v4();
        let span = info_span!("watcher_session", session = %id);
        let _entered = span.enter();
        info!("Starting watcher service");

        // Subscribe first so an update racing this start is still delivered
        let changes = self.settings.subscribe();
        let current = self.settings.get();
        apply_settings(&self.thresholds, &self.analyzer, &self.guard, &current);

        let frames = Arc::new(LatestFrame::new());
        let cancel = CancellationToken::new();

        let bound = {
            let mut camera = self.lock_camera();
            match camera.start(&CameraConfig::front(current.min_face_size), frames.clone()) {
                Ok(()) => true,
                Err(e) => {
                    // Analysis stays idle; the guard never engages while unbound
                    error!("Camera bind failed: {}", e);
                    false
                }
            }
        };
        self.guard.set_camera_bound(bound);

        let analyzer_task = {
            let analyzer = self.analyzer.clone();
            let frames = frames.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { analyzer.run(frames, cancel).await }.instrument(span.clone()))
        };
        let follower_task = {
            let thresholds = self.thresholds.clone();
            let analyzer = self.analyzer.clone();
            let guard = self.guard.clone();
            let cancel = cancel.clone();
            tokio::spawn(
                async move { follow_settings(changes, thresholds, analyzer, guard, cancel).await }
                    .instrument(span.clone()),
            )
        };

        if let Err(e) = self.guard.start() {
            cancel.cancel();
            frames.close();
            self.lock_camera().stop();
            self.guard.set_camera_bound(false);
            return Err(e.into());
        }

        *session = Some(Session {
            id,
            frames,
            cancel,
            tasks: vec![analyzer_task, follower_task],
        });
        self.running.set(true);
        info!("Watcher service running");
        Ok(())
    }

    /// Stop watching and tear protection down. A no-op when stopped.
    pub async fn stop(&self) {
        let Some(session) = self.session.lock().await.take() else {
            return;
        };

        let span = info_span!("watcher_session", session = %session.id);
        async {
            info!("Stopping watcher service");

            self.guard.stop().await;

            session.cancel.cancel();
            session.frames.close();
            for task in session.tasks {
                if let Err(e) = task.await {
                    warn!("Service task ended abnormally: {}", e);
                }
            }

            self.lock_camera().stop();
            self.guard.set_camera_bound(false);

            debug!(
                "Frames delivered={} dropped={}",
                session.frames.delivered(),
                session.frames.dropped()
            );
            self.running.set(false);
            info!("Watcher service stopped");
        }
        .instrument(span)
        .await
    }

    /// Reset protection to the disengaged baseline, e.g. when the host UI
    /// comes back to the foreground
    pub async fn resume(&self) -> Result<(), ServiceError> {
        if self.session.lock().await.is_none() {
            return Err(ServiceError::NotRunning);
        }
        info!("Resuming watcher service");
        self.guard.resume().await?;
        Ok(())
    }

    /// Camera (un)bound by the platform
    pub fn camera_state_changed(&self, bound: bool) {
        self.guard.set_camera_bound(bound);
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    pub fn running_state(&self) -> RunningState {
        self.running.clone()
    }

    pub fn protection(&self) -> ProtectionState {
        self.guard.state()
    }

    pub fn guard(&self) -> &ScreenGuard {
        &self.guard
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    fn lock_camera(&self) -> std::sync::MutexGuard<'_, Box<dyn CameraPipeline>> {
        match self.camera.lock() {
            Ok(camera) => camera,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn apply_settings(thresholds: &ThresholdConfig, analyzer: &FrameAnalyzer, guard: &ScreenGuard, settings: &Settings) {
    thresholds.apply(&settings.to_thresholds());
    analyzer.set_classifier(settings.to_classifier());
    guard.set_options(settings.to_guard_options());
}

/// Push every settings change into the live components
async fn follow_settings(
    mut changes: watch::Receiver<Settings>,
    thresholds: Arc<ThresholdConfig>,
    analyzer: Arc<FrameAnalyzer>,
    guard: Arc<ScreenGuard>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = changes.borrow_and_update().clone();
                apply_settings(&thresholds, &analyzer, &guard, &current);
                info!("Applied updated settings");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use camera_capture::{CameraError, CapturedFrame, FrameRelease, VideoFrame};
    use gaze::{DetectedFace, DetectionError, FaceBbox, FaceSelection};
    use screen_guard::{NoAudioFocus, OverlayError, OverlayStyle, OverlaySurface, WindowKind};
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{sleep, timeout, Instant};

    #[derive(Default)]
    struct CameraProbe {
        fail_bind: AtomicBool,
        starts: AtomicUsize,
        stops: AtomicUsize,
        sink: Mutex<Option<Arc<LatestFrame>>>,
        next_sequence: AtomicU64,
        released: AtomicUsize,
    }

    impl FrameRelease for CameraProbe {
        fn release(&self, _sequence: u64) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeCamera(Arc<CameraProbe>);

    impl CameraPipeline for FakeCamera {
        fn start(&mut self, _config: &CameraConfig, sink: Arc<LatestFrame>) -> Result<(), CameraError> {
            self.0.starts.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_bind.load(Ordering::SeqCst) {
                return Err(CameraError::Bind("camera in use".into()));
            }
            *self.0.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn stop(&mut self) {
            self.0.stops.fetch_add(1, Ordering::SeqCst);
            self.0.sink.lock().unwrap().take();
        }
    }

    /// Deliver one frame through the bound camera
    fn capture(probe: &Arc<CameraProbe>) {
        let seq = probe.next_sequence.fetch_add(1, Ordering::SeqCst);
        let image = VideoFrame::new(vec![0; 16], 640, 480, 0, seq);
        let frame = CapturedFrame::new(seq, Some(image), probe.clone());
        if let Some(sink) = probe.sink.lock().unwrap().as_ref() {
            sink.deliver(frame);
        }
    }

    /// Sees a frontal, eyes-open face while `looking` is set
    #[derive(Default)]
    struct FakeDetector {
        looking: AtomicBool,
    }

    #[async_trait]
    impl FaceDetector for FakeDetector {
        async fn detect(&self, _frame: &VideoFrame) -> Result<Vec<DetectedFace>, DetectionError> {
            if !self.looking.load(Ordering::SeqCst) {
                return Ok(vec![]);
            }
            let bbox = FaceBbox {
                x: 100.0,
                y: 80.0,
                width: 320.0,
                height: 320.0,
            };
            Ok(vec![DetectedFace::with_pose(bbox, 2.0, -3.0).eyes(0.95, 0.9)])
        }
    }

    #[derive(Default)]
    struct Window {
        attached: AtomicBool,
    }

    struct FakeSurface(Arc<Window>);

    impl OverlaySurface for FakeSurface {
        fn has_permission(&self) -> bool {
            true
        }

        fn attach(&mut self, _kind: WindowKind, _style: &OverlayStyle) -> Result<(), OverlayError> {
            self.0.attached.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn detach(&mut self) -> Result<(), OverlayError> {
            self.0.attached.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_attached(&self) -> bool {
            self.0.attached.load(Ordering::SeqCst)
        }
    }

    struct Harness {
        service: WatcherService,
        settings: Arc<SettingsStore>,
        camera: Arc<CameraProbe>,
        detector: Arc<FakeDetector>,
        window: Arc<Window>,
    }

    fn harness() -> Harness {
        let settings = Arc::new(SettingsStore::in_memory());
        settings
            .update(|s| {
                s.screen_off_delay_secs = 0.1;
                s.wake_delay_secs = 0.1;
                s.poll_interval_ms = 10;
            })
            .unwrap();

        let camera = Arc::new(CameraProbe::default());
        let detector = Arc::new(FakeDetector::default());
        let window = Arc::new(Window::default());
        let service = WatcherService::new(
            settings.clone(),
            ServiceCollaborators {
                camera: Box::new(FakeCamera(camera.clone())),
                detector: detector.clone(),
                overlay: OverlayHandle::spawn(FakeSurface(window.clone())).unwrap(),
                audio: Arc::new(NoAudioFocus),
                lock: None,
            },
        );

        Harness {
            service,
            settings,
            camera,
            detector,
            window,
        }
    }

    /// Runs on the paused test clock, so the returned time is virtual
    async fn wait_for(service: &WatcherService, want: ProtectionState) -> Duration {
        let started = Instant::now();
        let mut rx = service.guard().subscribe();
        timeout(Duration::from_secs(60), rx.wait_for(|s| *s == want))
            .await
            .expect("protection state not reached")
            .unwrap();
        started.elapsed()
    }

    fn within_a_poll(elapsed: Duration, target: Duration) -> bool {
        let poll = Duration::from_millis(10);
        elapsed + poll >= target && elapsed <= target + poll
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_lifecycle() {
        let h = harness();
        let mut running = h.service.running_state().subscribe();

        h.service.start().await.unwrap();
        h.service.start().await.unwrap();
        assert!(h.service.is_running());
        assert!(*running.borrow_and_update());
        assert_eq!(h.camera.starts.load(Ordering::SeqCst), 1);

        h.service.stop().await;
        assert!(!h.service.is_running());
        assert_eq!(h.camera.stops.load(Ordering::SeqCst), 1);
        assert_eq!(h.service.protection(), ProtectionState::Disengaged);
        assert!(!h.service.guard().is_watching());
    }

    #[tokio::test(start_paused = true)]
    async fn test_looking_away_blacks_out_and_looking_back_restores() {
        let h = harness();
        h.service.start().await.unwrap();

        capture(&h.camera);
        let elapsed = wait_for(&h.service, ProtectionState::Overlay).await;
        assert!(within_a_poll(elapsed, Duration::from_millis(100)), "blacked out after {:?}", elapsed);
        assert!(h.window.attached.load(Ordering::SeqCst));

        h.detector.looking.store(true, Ordering::SeqCst);
        capture(&h.camera);
        let elapsed = wait_for(&h.service, ProtectionState::Disengaged).await;
        assert!(within_a_poll(elapsed, Duration::from_millis(100)), "restored after {:?}", elapsed);
        assert!(!h.window.attached.load(Ordering::SeqCst));

        h.service.stop().await;
        assert_eq!(
            h.camera.released.load(Ordering::SeqCst) as u64,
            h.camera.next_sequence.load(Ordering::SeqCst)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_failure_leaves_screen_alone() {
        let h = harness();
        h.camera.fail_bind.store(true, Ordering::SeqCst);

        h.service.start().await.unwrap();
        assert!(h.service.is_running());

        sleep(Duration::from_millis(400)).await;
        assert_eq!(h.service.protection(), ProtectionState::Disengaged);
        assert!(!h.window.attached.load(Ordering::SeqCst));

        // Platform reports a late bind
        h.service.camera_state_changed(true);
        wait_for(&h.service, ProtectionState::Overlay).await;

        h.service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_changes_reach_live_components() {
        let h = harness();
        h.service.start().await.unwrap();

        // Lands before the follower task has been polled even once
        h.settings
            .update(|s| {
                s.yaw_threshold = 45.0;
                s.face_selection = FaceSelection::Any;
                s.pause_media = false;
            })
            .unwrap();

        timeout(Duration::from_secs(5), async {
            while h.service.thresholds().snapshot().yaw_degrees != 45.0 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("settings update never applied");
        assert!(!h.service.guard().options().pause_media);

        h.service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_change_retimes_running_guard() {
        let h = harness();
        h.service.start().await.unwrap();
        h.settings.update(|s| s.screen_off_delay_secs = 0.5).unwrap();

        capture(&h.camera);
        let elapsed = wait_for(&h.service, ProtectionState::Overlay).await;
        assert!(within_a_poll(elapsed, Duration::from_millis(500)), "blacked out after {:?}", elapsed);

        h.service.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_requires_running() {
        let h = harness();
        assert!(matches!(h.service.resume().await, Err(ServiceError::NotRunning)));

        h.service.start().await.unwrap();
        wait_for(&h.service, ProtectionState::Overlay).await;
        h.service.resume().await.unwrap();
        assert!(h.service.guard().is_watching());

        h.service.stop().await;
    }
}
