//! Video frame types and buffer ownership

use std::fmt;
use std::sync::Arc;

/// Decoded analysis frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Luma or RGB pixel data, layout is up to the detector
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Clockwise rotation needed to make the image upright
    pub rotation_degrees: u16,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u64,
}

impl VideoFrame {
    /// Create a new video frame from raw pixel data
    pub fn new(data: Vec<u8>, width: u32, height: u32, rotation_degrees: u16, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            rotation_degrees,
            timestamp_ns: 0,
            sequence,
        }
    }

    /// Width of the image once rotated upright
    pub fn upright_width(&self) -> u32 {
        if self.rotation_degrees % 180 == 90 {
            self.height
        } else {
            self.width
        }
    }
}

/// Returns a frame buffer to the camera pipeline
pub trait FrameRelease: Send + Sync {
    fn release(&self, sequence: u64);
}

/// A frame borrowed from the camera pipeline.
///
/// The underlying buffer goes back to the pipeline exactly once, either
/// through [`CapturedFrame::close`] or when the frame is dropped.
pub struct CapturedFrame {
    sequence: u64,
    image: Option<VideoFrame>,
    releaser: Option<Arc<dyn FrameRelease>>,
}

impl CapturedFrame {
    /// Wrap a buffer; `image` is `None` when the pipeline had no image attached
    pub fn new(sequence: u64, image: Option<VideoFrame>, releaser: Arc<dyn FrameRelease>) -> Self {
        Self {
            sequence,
            image,
            releaser: Some(releaser),
        }
    }

    /// Get frame sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Decoded image, if the pipeline attached one
    pub fn image(&self) -> Option<&VideoFrame> {
        self.image.as_ref()
    }

    /// Release the buffer now
    pub fn close(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(releaser) = self.releaser.take() {
            releaser.release(self.sequence);
        }
    }
}

impl Drop for CapturedFrame {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for CapturedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedFrame")
            .field("sequence", &self.sequence)
            .field("has_image", &self.image.is_some())
            .field("released", &self.releaser.is_none())
            .finish()
    }
}
