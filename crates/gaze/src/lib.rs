//! Gaze classification
//!
//! Turns front-camera frames into a single "is the user looking" verdict:
//! - Face detection through an external model ([`FaceDetector`])
//! - Face selection (largest face or any face)
//! - Head pose and eye-open gating against live [`ThresholdConfig`]
//! - Last-write-wins publishing of the verdict ([`SignalSlot`])

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod signal;

pub use analyzer::FrameAnalyzer;
pub use classifier::{EyeGate, FaceSelection, GazeClassifier};
pub use config::{AtomicF32, ThresholdConfig, Thresholds};
pub use detector::{DetectedFace, FaceBbox, FaceDetector, HeadPose};
pub use signal::{GazeSignal, SignalSlot};

use thiserror::Error;

/// Detection error types
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
