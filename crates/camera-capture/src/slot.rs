//! Keep-only-latest frame slot
//!
//! The camera writes, a single analyzer reads. A frame that is still
//! pending when a newer one arrives is released and counted as dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::frame::CapturedFrame;

/// Single-slot frame handoff between camera and analyzer
pub struct LatestFrame {
    pending: Mutex<Option<CapturedFrame>>,
    notify: Notify,
    closed: AtomicBool,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl LatestFrame {
    /// Create an empty, open slot
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Hand a frame to the analyzer, replacing any frame not yet taken
    pub fn deliver(&self, frame: CapturedFrame) {
        if self.closed.load(Ordering::Acquire) {
            trace!("Slot closed, releasing frame {}", frame.sequence());
            frame.close();
            return;
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        let replaced = match self.pending.lock() {
            Ok(mut pending) => pending.replace(frame),
            Err(poisoned) => poisoned.into_inner().replace(frame),
        };

        // Release outside the lock
        if let Some(stale) = replaced {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("camera_frames_dropped_total").increment(1);
            trace!("Dropping stale frame {}", stale.sequence());
            stale.close();
        }

        self.notify.notify_one();
    }

    /// Wait for the next frame. Returns `None` once the slot is closed.
    pub async fn next(&self) -> Option<CapturedFrame> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(frame) = self.take() {
                return Some(frame);
            }
            self.notify.notified().await;
        }
    }

    /// Take the pending frame without waiting
    pub fn take(&self) -> Option<CapturedFrame> {
        match self.pending.lock() {
            Ok(mut pending) => pending.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Close the slot, releasing any pending frame and waking the reader
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(frame) = self.take() {
            frame.close();
        }
        self.notify.notify_waiters();
        self.notify.notify_one();
        debug!(
            "Frame slot closed (delivered={}, dropped={})",
            self.delivered(),
            self.dropped()
        );
    }

    /// Whether the slot has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Total frames delivered (for statistics)
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Frames replaced before the analyzer took them
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for LatestFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::tests::CountingRelease;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn frame(seq: u64, counter: &Arc<CountingRelease>) -> CapturedFrame {
        CapturedFrame::new(seq, None, counter.clone())
    }

    #[test]
    fn test_keeps_only_latest() {
        let counter = Arc::new(CountingRelease::default());
        let slot = LatestFrame::new();

        slot.deliver(frame(1, &counter));
        slot.deliver(frame(2, &counter));
        slot.deliver(frame(3, &counter));

        assert_eq!(slot.dropped(), 2);
        assert_eq!(*counter.released.lock().unwrap(), vec![1, 2]);

        let latest = slot.take().unwrap();
        assert_eq!(latest.sequence(), 3);
        drop(latest);
        assert_eq!(counter.released.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_close_releases_pending_and_rejects_new() {
        let counter = Arc::new(CountingRelease::default());
        let slot = LatestFrame::new();

        slot.deliver(frame(1, &counter));
        slot.close();
        slot.deliver(frame(2, &counter));

        assert!(slot.take().is_none());
        assert_eq!(*counter.released.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_next_wakes_on_delivery() {
        let counter = Arc::new(CountingRelease::default());
        let slot = Arc::new(LatestFrame::new());

        let reader = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.next().await.map(|f| f.sequence()) })
        };
        tokio::task::yield_now().await;
        slot.deliver(frame(9, &counter));

        assert_eq!(reader.await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_next_ends_on_close() {
        let slot = Arc::new(LatestFrame::new());
        let reader = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.next().await.is_none() })
        };
        tokio::task::yield_now().await;
        slot.close();

        assert!(reader.await.unwrap());
    }

    proptest! {
        #[test]
        fn every_delivered_frame_is_released_once(count in 1u64..64, take_every in 1u64..8) {
            let counter = Arc::new(CountingRelease::default());
            let slot = LatestFrame::new();

            for seq in 0..count {
                slot.deliver(frame(seq, &counter));
                if seq % take_every == 0 {
                    if let Some(f) = slot.take() {
                        f.close();
                    }
                }
            }
            slot.close();

            let mut released = counter.released.lock().unwrap().clone();
            released.sort_unstable();
            prop_assert_eq!(released, (0..count).collect::<Vec<_>>());
        }
    }
}
