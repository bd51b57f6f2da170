//! RTSP frame source.
//!
//! GStreamer-backed decode behind the `rtsp-gstreamer` feature. The
//! pipeline is `rtspsrc ! decodebin ! videoconvert ! appsink` constrained
//! to packed RGB, with the appsink bounded to one buffer so a stalled
//! consumer drops frames instead of buffering them.

use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, Context, Result};

use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceConfig, SourceStats};

pub struct RtspSource {
    config: SourceConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    connects: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    last_error: Option<String>,
}

impl RtspSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let pipeline_description = format!(
            "rtspsrc location={} latency=0 ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            config.url
        );
        let pipeline = gstreamer::parse_launch(&pipeline_description)
            .context("build RTSP pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("RTSP pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("appsink element has unexpected type"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            connects: 0,
            last_frame_at: None,
            connected_at: None,
            last_error: None,
        })
    }

    fn frame_timeout(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            500
        } else {
            (1000 / self.config.target_fps).saturating_mul(4)
        };
        Duration::from_millis(base_ms.max(500) as u64)
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.timed_pop(Duration::from_millis(0)) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.last_error = Some("gstreamer reached EOS".to_string());
                }
                _ => {}
            }
        }
    }
}

impl FrameSource for RtspSource {
    fn connect(&mut self) -> Result<()> {
        self.last_error = None;
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set RTSP pipeline to Playing")?;
        self.connected_at = Some(Instant::now());
        self.connects += 1;
        log::info!("RtspSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.poll_bus();
        if let Some(error) = &self.last_error {
            return Err(anyhow!("RTSP stream error: {}", error));
        }

        let sample = self
            .appsink
            .try_pull_sample(self.frame_timeout())
            .context("pull RTSP sample")?
            .ok_or_else(|| anyhow!("RTSP stream stalled"))?;

        let (pixels, width, height) = sample_to_pixels(&sample)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Ok(Frame::new(pixels, width, height, SystemTime::now()))
    }

    fn release(&mut self) {
        if let Err(err) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("RtspSource: failed to stop pipeline: {}", err);
        }
        self.connected_at = None;
        self.last_frame_at = None;
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            connects: self.connects,
        }
    }
}

fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("RTSP sample missing buffer")?;
    let caps = sample.caps().context("RTSP sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse RTSP caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride(0) as usize;

    let map = buffer.map_readable().context("map RTSP buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("RTSP buffer row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
