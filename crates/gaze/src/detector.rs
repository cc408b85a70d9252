//! Face detector collaborator and its output types

use async_trait::async_trait;
use camera_capture::frame::VideoFrame;
use serde::{Deserialize, Serialize};

use crate::DetectionError;

/// Face bounding box in upright image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBbox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Head pose (Euler angles)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    /// Yaw (left-right rotation) in degrees
    pub yaw: f32,
    /// Pitch (up-down tilt) in degrees
    pub pitch: f32,
}

/// One face reported by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: FaceBbox,

    /// Missing when the detector ran without pose estimation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_pose: Option<HeadPose>,

    /// Probability the left eye is open (0-1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_eye_open: Option<f32>,

    /// Probability the right eye is open (0-1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_eye_open: Option<f32>,
}

impl DetectedFace {
    /// Face with a pose and no eye classification
    pub fn with_pose(bbox: FaceBbox, yaw: f32, pitch: f32) -> Self {
        Self {
            bbox,
            head_pose: Some(HeadPose { yaw, pitch }),
            left_eye_open: None,
            right_eye_open: None,
        }
    }

    pub fn eyes(mut self, left: f32, right: f32) -> Self {
        self.left_eye_open = Some(left);
        self.right_eye_open = Some(right);
        self
    }
}

/// Face/gaze detection model.
///
/// Given one upright-able frame, report zero or more faces. The model is a
/// black box; failures are per frame.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<DetectedFace>, DetectionError>;
}
