//! Latest gaze verdict

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Per-frame attention verdict
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GazeSignal {
    pub is_attending: bool,

    /// Faces seen in the frame
    pub face_count: usize,

    /// Pose of the evaluated face
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaw_deg: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_deg: Option<f32>,

    /// Eye-open probabilities of the evaluated face
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_eye_open_prob: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_eye_open_prob: Option<f32>,
}

impl GazeSignal {
    pub fn attending() -> Self {
        Self {
            is_attending: true,
            face_count: 1,
            ..Default::default()
        }
    }

    pub fn not_attending(face_count: usize) -> Self {
        Self {
            is_attending: false,
            face_count,
            ..Default::default()
        }
    }
}

/// Last-write-wins register for the newest [`GazeSignal`].
///
/// Publishing overwrites, it never queues or waits for readers.
#[derive(Debug, Clone)]
pub struct SignalSlot {
    tx: watch::Sender<GazeSignal>,
}

impl SignalSlot {
    /// Starts as "not attending"
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GazeSignal::default());
        Self { tx }
    }

    pub fn publish(&self, signal: GazeSignal) {
        self.tx.send_replace(signal);
    }

    pub fn latest(&self) -> GazeSignal {
        self.tx.borrow().clone()
    }

    pub fn is_attending(&self) -> bool {
        self.tx.borrow().is_attending
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<GazeSignal> {
        self.tx.subscribe()
    }
}

impl Default for SignalSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_wins() {
        let slot = SignalSlot::new();
        assert!(!slot.is_attending());

        slot.publish(GazeSignal::attending());
        slot.publish(GazeSignal::not_attending(2));

        assert_eq!(slot.latest(), GazeSignal::not_attending(2));
    }

    #[tokio::test]
    async fn test_subscriber_sees_publish() {
        let slot = SignalSlot::new();
        let mut rx = slot.subscribe();

        slot.publish(GazeSignal::attending());
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_attending);
    }
}
