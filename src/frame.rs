//! Frame container.
//!
//! A `Frame` is an owned RGB8 buffer plus capture metadata. Exactly one stage
//! holds a frame at a time; publication into the shared store always clones,
//! so external consumers never share a mutable buffer with the pipeline.

use std::time::SystemTime;

use crate::geometry::BBox;

/// One captured video frame. RGB8, row-major, no padding.
#[derive(Clone)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: SystemTime,
}

impl Frame {
    /// Create a frame from an RGB8 buffer. The buffer length must be
    /// `width * height * 3`; ingestion is responsible for normalization.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, captured_at: SystemTime) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 3) as usize);
        Self {
            pixels,
            width,
            height,
            captured_at,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Crop a bbox expanded by `padding` and clamped to the frame bounds.
    ///
    /// Returns the cropped frame and the crop origin, which cascade stages
    /// use to translate crop-local detections back to frame coordinates.
    /// Returns `None` when the clamped region is empty.
    pub fn crop_padded(&self, bbox: &BBox, padding: i32) -> Option<(Frame, i32, i32)> {
        let region = bbox.padded(padding, self.width, self.height);
        let w = region.width();
        let h = region.height();
        if w <= 0 || h <= 0 {
            return None;
        }

        let mut pixels = Vec::with_capacity((w * h * 3) as usize);
        let stride = (self.width * 3) as usize;
        for row in region.y1..region.y2 {
            let start = row as usize * stride + region.x1 as usize * 3;
            let end = start + w as usize * 3;
            pixels.extend_from_slice(&self.pixels[start..end]);
        }

        Some((
            Frame::new(pixels, w as u32, h as u32, self.captured_at),
            region.x1,
            region.y1,
        ))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .finish_non_exhaustive()
    }
}
