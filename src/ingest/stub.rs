//! Synthetic frame source for tests and bring-up.

use std::time::SystemTime;

use anyhow::{anyhow, Result};
use rand::Rng;

use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceConfig, SourceStats};

/// Generates noisy synthetic frames for `stub://` URLs.
///
/// Failure injection: `fail_every(n)` makes every n-th read return an
/// error, which exercises the worker's retry and reacquire paths without
/// a real camera misbehaving on cue.
pub struct StubSource {
    config: SourceConfig,
    connected: bool,
    frame_count: u64,
    reads: u64,
    connects: u64,
    fail_every: Option<u64>,
}

impl StubSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            connected: false,
            frame_count: 0,
            reads: 0,
            connects: 0,
            fail_every: None,
        }
    }

    pub fn fail_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    fn synthesize_pixels(&mut self) -> Vec<u8> {
        let count = (self.config.width * self.config.height * 3) as usize;
        let mut rng = rand::thread_rng();

        // Flat mid-gray scene with per-frame noise so consecutive frames
        // are never byte-identical.
        let mut pixels = vec![96u8; count];
        for pixel in pixels.iter_mut().step_by(17) {
            *pixel = rng.gen();
        }
        pixels
    }
}

impl FrameSource for StubSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.connects += 1;
        log::info!("StubSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("stub source {} is not connected", self.config.url));
        }

        self.reads += 1;
        if let Some(n) = self.fail_every {
            if self.reads % n == 0 {
                return Err(anyhow!("stub source {}: injected read failure", self.config.url));
            }
        }

        self.frame_count += 1;
        let pixels = self.synthesize_pixels();
        Ok(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            SystemTime::now(),
        ))
    }

    fn release(&mut self) {
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            connects: self.connects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SourceConfig {
        SourceConfig {
            url: "stub://test".to_string(),
            target_fps: 10,
            width: 32,
            height: 32,
        }
    }

    #[test]
    fn read_before_connect_fails() {
        let mut source = StubSource::new(small_config());
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn release_and_reconnect_counts_connects() -> Result<()> {
        let mut source = StubSource::new(small_config());
        source.connect()?;
        source.next_frame()?;
        source.release();
        assert!(!source.is_healthy());

        source.connect()?;
        source.next_frame()?;
        let stats = source.stats();
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.frames_captured, 2);
        Ok(())
    }

    #[test]
    fn injected_failures_hit_every_nth_read() -> Result<()> {
        let mut source = StubSource::new(small_config()).fail_every(3);
        source.connect()?;
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_err());
        assert!(source.next_frame().is_ok());
        Ok(())
    }
}
