//! Frame analyzer
//!
//! Runs the camera side of the pipeline: take the newest frame, detect,
//! classify, publish. One frame is in flight at a time.

use camera_capture::{CapturedFrame, LatestFrame};
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::classifier::GazeClassifier;
use crate::config::ThresholdConfig;
use crate::detector::FaceDetector;
use crate::signal::SignalSlot;

/// Turns camera frames into [`crate::GazeSignal`]s
pub struct FrameAnalyzer {
    detector: Arc<dyn FaceDetector>,
    classifier: RwLock<GazeClassifier>,
    thresholds: Arc<ThresholdConfig>,
    signal: SignalSlot,
}

impl FrameAnalyzer {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        classifier: GazeClassifier,
        thresholds: Arc<ThresholdConfig>,
        signal: SignalSlot,
    ) -> Self {
        Self {
            detector,
            classifier: RwLock::new(classifier),
            thresholds,
            signal,
        }
    }

    /// Swap the face policy; takes effect on the next frame
    pub fn set_classifier(&self, classifier: GazeClassifier) {
        match self.classifier.write() {
            Ok(mut current) => *current = classifier,
            Err(poisoned) => *poisoned.into_inner() = classifier,
        }
    }

    pub fn classifier(&self) -> GazeClassifier {
        match self.classifier.read() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Analyze one frame. The frame is released before this returns,
    /// whatever the outcome.
    pub async fn analyze(&self, frame: CapturedFrame) {
        let Some(image) = frame.image() else {
            trace!("Frame {} has no image", frame.sequence());
            frame.close();
            return;
        };

        match self.detector.detect(image).await {
            Ok(faces) => {
                let thresholds = self.thresholds.snapshot();
                let signal = self.classifier().classify(&faces, image.upright_width(), &thresholds);
                trace!("Frame {}: {:?}", frame.sequence(), signal);
                self.signal.publish(signal);
            }
            Err(e) => {
                // Previous verdict stays in effect
                metrics::counter!("gaze_detection_failures_total").increment(1);
                warn!("Face detection failed on frame {}: {}", frame.sequence(), e);
            }
        }

        frame.close();
    }

    /// Consume frames until the slot closes or `cancel` fires
    pub async fn run(&self, frames: Arc<LatestFrame>, cancel: CancellationToken) {
        info!("Starting frame analyzer");

        loop {
            tokio::select! {
                next = frames.next() => match next {
                    Some(frame) => self.analyze(frame).await,
                    None => {
                        debug!("Frame slot closed");
                        break;
                    }
                },
                _ = cancel.cancelled() => break,
            }
        }

        info!("Frame analyzer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DetectedFace, FaceBbox};
    use crate::DetectionError;
    use async_trait::async_trait;
    use camera_capture::{FrameRelease, VideoFrame};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingRelease {
        released: Mutex<Vec<u64>>,
    }

    impl FrameRelease for CountingRelease {
        fn release(&self, sequence: u64) {
            self.released.lock().unwrap().push(sequence);
        }
    }

    /// Returns a frontal face for even sequences, fails on multiples of 3
    struct ScriptedDetector;

    #[async_trait]
    impl FaceDetector for ScriptedDetector {
        async fn detect(&self, frame: &VideoFrame) -> Result<Vec<DetectedFace>, DetectionError> {
            if frame.sequence % 3 == 0 {
                return Err(DetectionError::Inference("model busy".into()));
            }
            if frame.sequence % 2 == 0 {
                let bbox = FaceBbox {
                    x: 0.0,
                    y: 0.0,
                    width: 320.0,
                    height: 320.0,
                };
                Ok(vec![DetectedFace::with_pose(bbox, 0.0, 0.0).eyes(0.9, 0.9)])
            } else {
                Ok(vec![])
            }
        }
    }

    fn analyzer(signal: SignalSlot) -> FrameAnalyzer {
        FrameAnalyzer::new(
            Arc::new(ScriptedDetector),
            GazeClassifier::default(),
            Arc::new(ThresholdConfig::default()),
            signal,
        )
    }

    fn frame(seq: u64, with_image: bool, release: &Arc<CountingRelease>) -> CapturedFrame {
        let image = with_image.then(|| VideoFrame::new(vec![0; 16], 640, 480, 0, seq));
        CapturedFrame::new(seq, image, release.clone())
    }

    #[tokio::test]
    async fn test_release_on_every_branch() {
        let release = Arc::new(CountingRelease::default());
        let analyzer = analyzer(SignalSlot::new());

        analyzer.analyze(frame(1, false, &release)).await; // no image
        analyzer.analyze(frame(2, true, &release)).await; // face
        analyzer.analyze(frame(3, true, &release)).await; // detector error
        analyzer.analyze(frame(5, true, &release)).await; // empty result

        assert_eq!(*release.released.lock().unwrap(), vec![1, 2, 3, 5]);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_signal() {
        let release = Arc::new(CountingRelease::default());
        let signal = SignalSlot::new();
        let analyzer = analyzer(signal.clone());

        analyzer.analyze(frame(2, true, &release)).await;
        assert!(signal.is_attending());

        analyzer.analyze(frame(3, true, &release)).await;
        assert!(signal.is_attending());

        analyzer.analyze(frame(5, true, &release)).await;
        assert!(!signal.is_attending());
    }

    #[tokio::test]
    async fn test_run_drains_until_closed() {
        let release = Arc::new(CountingRelease::default());
        let signal = SignalSlot::new();
        let analyzer = Arc::new(analyzer(signal.clone()));
        let frames = Arc::new(LatestFrame::new());

        let task = {
            let analyzer = analyzer.clone();
            let frames = frames.clone();
            tokio::spawn(async move { analyzer.run(frames, CancellationToken::new()).await })
        };

        frames.deliver(frame(4, true, &release));
        while release.released.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        frames.close();
        task.await.unwrap();

        assert!(signal.is_attending());
        assert_eq!(*release.released.lock().unwrap(), vec![4]);
    }
}
