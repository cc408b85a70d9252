//! Attention classification
//!
//! Reduces a detector result to one [`GazeSignal`].

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::Thresholds;
use crate::detector::DetectedFace;
use crate::signal::GazeSignal;

/// Which faces are allowed to count as the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceSelection {
    /// Only the face with the largest bounding box is evaluated
    #[default]
    Largest,
    /// Attending if any detected face passes
    Any,
}

/// Whether eye-open probabilities take part in the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeGate {
    #[default]
    Required,
    Ignored,
}

/// Gaze classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct GazeClassifier {
    pub selection: FaceSelection,
    pub eye_gate: EyeGate,
}

impl GazeClassifier {
    pub fn new(selection: FaceSelection, eye_gate: EyeGate) -> Self {
        Self { selection, eye_gate }
    }

    /// Classify one frame's faces. No face means not attending.
    pub fn classify(&self, faces: &[DetectedFace], frame_width: u32, thresholds: &Thresholds) -> GazeSignal {
        let evaluated = match self.selection {
            FaceSelection::Largest => largest_face(faces),
            FaceSelection::Any => faces.iter().find(|f| self.passes(f, frame_width, thresholds)),
        };

        let Some(face) = evaluated else {
            return GazeSignal::not_attending(faces.len());
        };

        let attending = self.passes(face, frame_width, thresholds);
        trace!(
            "Classified {} face(s): attending={} pose={:?}",
            faces.len(),
            attending,
            face.head_pose
        );

        GazeSignal {
            is_attending: attending,
            face_count: faces.len(),
            yaw_deg: face.head_pose.map(|p| p.yaw),
            pitch_deg: face.head_pose.map(|p| p.pitch),
            left_eye_open_prob: face.left_eye_open,
            right_eye_open_prob: face.right_eye_open,
        }
    }

    /// Every configured constraint must hold at once
    fn passes(&self, face: &DetectedFace, frame_width: u32, thresholds: &Thresholds) -> bool {
        let Some(pose) = face.head_pose else {
            return false;
        };
        if pose.yaw.abs() >= thresholds.yaw_degrees || pose.pitch.abs() >= thresholds.pitch_degrees {
            return false;
        }

        if frame_width > 0 && face.bbox.width / (frame_width as f32) < thresholds.min_face_size {
            return false;
        }

        match self.eye_gate {
            EyeGate::Ignored => true,
            EyeGate::Required => {
                let open = |p: Option<f32>| p.is_some_and(|p| p > thresholds.eye_open_probability);
                open(face.left_eye_open) && open(face.right_eye_open)
            }
        }
    }
}

fn largest_face(faces: &[DetectedFace]) -> Option<&DetectedFace> {
    faces
        .iter()
        .max_by(|a, b| a.bbox.area().total_cmp(&b.bbox.area()))
}
