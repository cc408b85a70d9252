//! Camera Capture Library for the screen watcher
//!
//! Models the front camera as an external collaborator:
//! - Frames carry rotation metadata and must be released exactly once
//! - Delivery uses a keep-only-latest slot, so a slow analyzer drops frames
//!   instead of queueing them
//! - The camera itself sits behind the [`CameraPipeline`] trait

pub mod frame;
pub mod slot;

pub use frame::{CapturedFrame, FrameRelease, VideoFrame};
pub use slot::LatestFrame;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Use case binding failed: {0}")]
    Bind(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Camera not initialized")]
    NotInitialized,
}

/// Which physical camera to bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraFacing {
    /// Selfie camera, the only one that can see the user
    #[default]
    Front,
    Back,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera to bind
    pub facing: CameraFacing,
    /// Analysis width
    pub width: u32,
    /// Analysis height
    pub height: u32,
    /// Smallest face, as a fraction of image width, the detector should report
    pub min_face_size: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Front,
            width: 640,
            height: 480,
            min_face_size: 0.4,
        }
    }
}

impl CameraConfig {
    /// Front camera config with a detector face-size hint
    pub fn front(min_face_size: f32) -> Self {
        Self {
            min_face_size,
            ..Default::default()
        }
    }
}

/// Camera capture pipeline.
///
/// Implementations deliver frames into the sink from their own worker
/// thread. Each delivered frame is released by whoever ends up holding it.
pub trait CameraPipeline: Send {
    /// Bind the camera and begin delivering frames into `sink`
    fn start(&mut self, config: &CameraConfig, sink: Arc<LatestFrame>) -> Result<(), CameraError>;

    /// Unbind the camera; no further frames are delivered
    fn stop(&mut self);
}
