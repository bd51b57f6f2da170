//! Frame ingestion sources.
//!
//! A camera worker talks to its source only through [`FrameSource`]:
//! connect, pull frames, release. Sources are selected by URL scheme:
//! `stub://` yields a synthetic source for tests and bring-up, anything
//! else is treated as an RTSP stream and requires the `rtsp-gstreamer`
//! feature.
//!
//! The ingestion layer is responsible for:
//! - Normalizing decoder output to packed RGB8
//! - Stamping frames with their capture time
//!
//! It MUST NOT run detection, hold locks shared with other cameras, or
//! retain frames beyond handoff to the worker.

#[cfg(feature = "rtsp-gstreamer")]
pub mod rtsp;
mod stub;

use anyhow::Result;

use crate::frame::Frame;

#[cfg(feature = "rtsp-gstreamer")]
pub use rtsp::RtspSource;
pub use stub::StubSource;

/// Configuration for one camera's source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Stream URL (`rtsp://...`) or `stub://<name>` for a synthetic source.
    pub url: String,
    /// Target frame rate. Real sources decimate to this; the stub ignores it.
    pub target_fps: u32,
    /// Frame width for synthetic sources.
    pub width: u32,
    /// Frame height for synthetic sources.
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Source-side counters, reported through camera statistics.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub connects: u64,
}

/// One camera's frame supply. Implementations are owned by a single worker
/// thread and are never shared.
pub trait FrameSource: Send {
    /// Open the stream. Called again after `release` when the worker
    /// reacquires a failing source.
    fn connect(&mut self) -> Result<()>;

    /// Pull the next frame, blocking up to the source's own timeout.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Tear the stream down. Must be safe to call repeatedly and is always
    /// called before the worker exits.
    fn release(&mut self);

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Build the source for a camera URL.
pub fn open_source(config: SourceConfig) -> Result<Box<dyn FrameSource>> {
    if config.url.starts_with("stub://") {
        return Ok(Box::new(StubSource::new(config)));
    }

    #[cfg(feature = "rtsp-gstreamer")]
    {
        Ok(Box::new(RtspSource::new(config)?))
    }
    #[cfg(not(feature = "rtsp-gstreamer"))]
    {
        anyhow::bail!(
            "camera url {:?} requires the rtsp-gstreamer feature",
            config.url
        )
    }
}
