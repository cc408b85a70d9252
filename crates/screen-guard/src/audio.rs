//! Transient audio focus held while the screen is blacked out

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Platform audio focus
pub trait AudioFocus: Send + Sync {
    /// Request transient focus; `true` when granted
    fn request_transient(&self) -> bool;

    /// Give focus back
    fn abandon(&self);
}

/// Idempotent wrapper: repeated acquires hold focus once, releases without
/// a matching acquire do nothing.
pub struct AudioGrip {
    focus: Arc<dyn AudioFocus>,
    held: AtomicBool,
}

impl AudioGrip {
    pub fn new(focus: Arc<dyn AudioFocus>) -> Self {
        Self {
            focus,
            held: AtomicBool::new(false),
        }
    }

    pub fn acquire(&self) {
        if self.held.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Acquiring audio grip");
        if !self.focus.request_transient() {
            warn!("Audio focus request denied");
            self.held.store(false, Ordering::Release);
        }
    }

    pub fn release(&self) {
        if !self.held.swap(false, Ordering::AcqRel) {
            return;
        }
        debug!("Releasing audio grip");
        self.focus.abandon();
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Audio focus that is never granted, for hosts without media control
pub struct NoAudioFocus;

impl AudioFocus for NoAudioFocus {
    fn request_transient(&self) -> bool {
        false
    }

    fn abandon(&self) {}
}
