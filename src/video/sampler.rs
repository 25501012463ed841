//! Fixed-interval frame sampling.
//!
//! [`FrameSampler`] walks a [`FrameSource`] in decode order and yields every
//! Nth frame, where `N = round(fps × interval)`. It is a single-pass, lazy
//! iterator: frames between samples are skipped without being materialised,
//! and a stream that ends early simply ends the iteration.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result, VideoError};
use crate::video::source::FrameSource;
use crate::video::types::SampledFrame;

pub struct FrameSampler<S: FrameSource = Box<dyn FrameSource>> {
    source: S,
    stride: u64,
    fps: f64,
    frame_count: u64,
    /// Frames consumed from the source so far
    position: u64,
    frames_dir: Option<PathBuf>,
    emitted: usize,
    ended_early: bool,
    done: bool,
}

impl<S: FrameSource> FrameSampler<S> {
    /// Sample `source` every `interval_seconds`
    pub fn new(source: S, interval_seconds: f64) -> Result<Self> {
        if !(interval_seconds > 0.0) || !interval_seconds.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "sampling.interval_seconds".to_string(),
                value: interval_seconds.to_string(),
            }
            .into());
        }

        let metadata = source.metadata();
        if !(metadata.fps > 0.0) {
            return Err(VideoError::InvalidParameters {
                details: format!("frame rate must be positive, got {}", metadata.fps),
            }
            .into());
        }

        let stride = ((metadata.fps * interval_seconds).round() as u64).max(1);
        let (fps, frame_count) = (metadata.fps, metadata.frame_count);

        debug!(
            "Sampling every {} frames ({:.2}s at {:.2}fps) over {} frames",
            stride, interval_seconds, fps, frame_count
        );

        Ok(Self {
            source,
            stride,
            fps,
            frame_count,
            position: 0,
            frames_dir: None,
            emitted: 0,
            ended_early: false,
            done: false,
        })
    }

    /// Also write each sampled frame to `dir` as `frame_<index>.jpg`
    pub fn with_frames_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frames_dir = Some(dir.into());
        self
    }

    /// Decode frames between two samples
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Number of frames yielded so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// True when the decode stream stopped before the advertised frame count
    pub fn ended_early(&self) -> bool {
        self.ended_early
    }

    fn finish(&mut self, early: bool) {
        if early {
            warn!(
                "Decode stream ended at frame {} of {}; continuing with {} sampled frames",
                self.position, self.frame_count, self.emitted
            );
        }
        self.ended_early = early;
        self.done = true;
        self.source.close();
    }

    fn persist(&self, sample: &SampledFrame) {
        let Some(dir) = &self.frames_dir else {
            return;
        };

        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Cannot create frames directory {:?}: {}", dir, e);
            return;
        }

        let path = dir.join(format!("frame_{}.jpg", sample.index));
        if let Err(e) = sample.image.save(&path) {
            warn!("Failed to persist frame {} to {:?}: {}", sample.index, path, e);
        }
    }
}

impl<S: FrameSource> Iterator for FrameSampler<S> {
    type Item = SampledFrame;

    fn next(&mut self) -> Option<SampledFrame> {
        if self.done {
            return None;
        }

        let target = self.emitted as u64 * self.stride;
        if target >= self.frame_count {
            self.finish(false);
            return None;
        }

        while self.position < target {
            match self.source.skip_frame() {
                Ok(true) => self.position += 1,
                Ok(false) => {
                    self.finish(true);
                    return None;
                }
                Err(e) => {
                    warn!("Decoding failed at frame {}: {}", self.position, e);
                    self.finish(true);
                    return None;
                }
            }
        }

        let image = match self.source.read_frame() {
            Ok(Some(image)) => image,
            Ok(None) => {
                self.finish(true);
                return None;
            }
            Err(e) => {
                warn!("Decoding failed at frame {}: {}", self.position, e);
                self.finish(true);
                return None;
            }
        };
        self.position += 1;

        let sample = SampledFrame {
            timestamp: target as f64 / self.fps,
            index: target,
            image,
        };
        self.persist(&sample);
        self.emitted += 1;

        if self.emitted % 100 == 0 {
            info!("Sampled {} frames (t={:.1}s)", self.emitted, sample.timestamp);
        }

        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::source::MemoryFrameSource;
    use tempfile::tempdir;

    fn timestamps<S: FrameSource>(sampler: FrameSampler<S>) -> Vec<f64> {
        sampler.map(|f| f.timestamp).collect()
    }

    #[test]
    fn test_thirty_seconds_at_ten_fps() {
        let sampler = FrameSampler::new(MemoryFrameSource::new(10.0, 300), 5.0).unwrap();
        assert_eq!(sampler.stride(), 50);
        assert_eq!(timestamps(sampler), vec![0.0, 5.0, 10.0, 15.0, 20.0, 25.0]);
    }

    #[test]
    fn test_indices_match_decode_order() {
        let sampler = FrameSampler::new(MemoryFrameSource::new(10.0, 300), 5.0).unwrap();
        for frame in sampler {
            let expected = MemoryFrameSource::color_for(frame.index);
            assert_eq!(frame.image.as_image().get_pixel(0, 0).0, expected);
            assert_eq!(frame.timestamp, frame.index as f64 / 10.0);
        }
    }

    #[test]
    fn test_spacing_with_fractional_fps() {
        let fps = 30000.0 / 1001.0;
        let interval = 2.0;
        let sampler = FrameSampler::new(MemoryFrameSource::new(fps, 1800), interval).unwrap();
        let ts = timestamps(sampler);

        assert!(ts.len() > 10);
        for pair in ts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(pair[1] > pair[0]);
            assert!((gap - interval).abs() <= 1.0 / fps, "gap {} too far from {}", gap, interval);
        }
    }

    #[test]
    fn test_tiny_interval_samples_every_frame() {
        let sampler = FrameSampler::new(MemoryFrameSource::new(10.0, 5), 0.01).unwrap();
        assert_eq!(sampler.stride(), 1);
        assert_eq!(sampler.count(), 5);
    }

    #[test]
    fn test_invalid_interval() {
        assert!(FrameSampler::new(MemoryFrameSource::new(10.0, 10), 0.0).is_err());
        assert!(FrameSampler::new(MemoryFrameSource::new(10.0, 10), -1.0).is_err());
    }

    #[test]
    fn test_truncated_stream_ends_early() {
        let source = MemoryFrameSource::new(10.0, 300).truncated_after(120);
        let mut sampler = FrameSampler::new(source, 5.0).unwrap();

        let ts: Vec<f64> = sampler.by_ref().map(|f| f.timestamp).collect();
        assert_eq!(ts, vec![0.0, 5.0, 10.0]);
        assert!(sampler.ended_early());
        assert_eq!(sampler.emitted(), 3);

        // Single pass: exhausted for good
        assert!(sampler.next().is_none());
    }

    #[test]
    fn test_empty_video() {
        let mut sampler = FrameSampler::new(MemoryFrameSource::new(10.0, 0), 5.0).unwrap();
        assert!(sampler.next().is_none());
        assert!(!sampler.ended_early());
    }

    #[test]
    fn test_frames_are_persisted() {
        let dir = tempdir().unwrap();
        let frames_dir = dir.path().join("frames");

        let sampler = FrameSampler::new(MemoryFrameSource::new(10.0, 100), 5.0)
            .unwrap()
            .with_frames_dir(&frames_dir);
        assert_eq!(sampler.count(), 2);

        assert!(frames_dir.join("frame_0.jpg").exists());
        assert!(frames_dir.join("frame_50.jpg").exists());
    }
}
