use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::types::{Frame, VideoMetadata};

/// Sequential decoder for a single video file
///
/// Implementations hand out frames in decode order. A source is single-pass:
/// once `read_frame` has returned `None` it stays exhausted.
pub trait FrameSource: Send {
    /// Frame rate, frame count and duration of the video
    fn metadata(&self) -> &VideoMetadata;

    /// Decode the next frame, `Ok(None)` at end of stream
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Advance past one frame without building an image.
    ///
    /// Returns `false` at end of stream.
    fn skip_frame(&mut self) -> Result<bool> {
        Ok(self.read_frame()?.is_some())
    }

    /// Release decoder resources. Further reads return `None`.
    fn close(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn metadata(&self) -> &VideoMetadata {
        (**self).metadata()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        (**self).read_frame()
    }

    fn skip_frame(&mut self) -> Result<bool> {
        (**self).skip_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Decodes a video through an external `ffmpeg` process writing raw RGB24 to a pipe
pub struct FfmpegFrameSource {
    path: PathBuf,
    metadata: VideoMetadata,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    scratch: Vec<u8>,
}

impl FfmpegFrameSource {
    /// Probe `path` with ffprobe and start streaming its first video stream
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VideoError::LoadFailed { path: path.display().to_string() }.into());
        }

        let metadata = probe(path)?;
        info!(
            "Video metadata: {}x{} @ {:.2}fps, {:.1}s, {} frames ({})",
            metadata.width, metadata.height, metadata.fps, metadata.duration,
            metadata.frame_count, metadata.codec
        );

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::DecodingFailed {
                reason: format!("Failed to spawn ffmpeg: {}", e),
            })?;

        let stdout = child.stdout.take().map(BufReader::new);
        let frame_bytes = metadata.width as usize * metadata.height as usize * 3;

        Ok(Self {
            path: path.to_path_buf(),
            metadata,
            child: Some(child),
            stdout,
            scratch: vec![0u8; frame_bytes],
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fill the scratch buffer with the next frame. `false` on a clean or short end of stream.
    fn fill_scratch(&mut self) -> Result<bool> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(false);
        };

        match stdout.read_exact(&mut self.scratch) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("Decode stream for {} ended", self.path.display());
                self.close();
                Ok(false)
            }
            Err(e) => {
                self.close();
                Err(VideoError::DecodingFailed { reason: e.to_string() }.into())
            }
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.fill_scratch()? {
            return Ok(None);
        }
        let frame = Frame::from_rgb_bytes(self.metadata.width, self.metadata.height, self.scratch.clone())
            .ok_or_else(|| VideoError::DecodingFailed {
                reason: "frame buffer does not match probed dimensions".to_string(),
            })?;
        Ok(Some(frame))
    }

    fn skip_frame(&mut self) -> Result<bool> {
        self.fill_scratch()
    }

    fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            // ffmpeg may still be writing; it is killed rather than drained
            if let Err(e) = child.kill() {
                debug!("ffmpeg already exited: {}", e);
            }
            let _ = child.wait();
        }
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run ffprobe on the first video stream of `path`
pub fn probe(path: &Path) -> Result<VideoMetadata> {
    let output = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
            "-select_streams", "v:0",
        ])
        .arg(path)
        .output()
        .map_err(|e| VideoError::ProbeFailed {
            path: path.display().to_string(),
            reason: format!("failed to execute ffprobe: {}", e),
        })?;

    if !output.status.success() {
        return Err(VideoError::ProbeFailed {
            path: path.display().to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    let json = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&json).map_err(|reason| {
        VideoError::ProbeFailed { path: path.display().to_string(), reason }.into()
    })
}

/// Turn ffprobe's JSON report into [`VideoMetadata`]
pub fn parse_probe_output(json: &str) -> std::result::Result<VideoMetadata, String> {
    let json: Value = serde_json::from_str(json).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    let stream = json["streams"]
        .as_array()
        .and_then(|s| s.first())
        .ok_or_else(|| "no video stream found".to_string())?;

    let width = stream["width"].as_u64().unwrap_or(0) as u32;
    let height = stream["height"].as_u64().unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(format!("invalid frame size {}x{}", width, height));
    }

    let codec = stream["codec_name"].as_str().unwrap_or("unknown").to_string();

    let fps = ["r_frame_rate", "avg_frame_rate"]
        .iter()
        .filter_map(|key| stream[*key].as_str())
        .map(parse_framerate)
        .find(|fps| *fps > 0.0)
        .ok_or_else(|| "stream reports no frame rate".to_string())?;

    let duration = stream["duration"]
        .as_str()
        .or_else(|| json["format"]["duration"].as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| *d > 0.0);

    let nb_frames = stream["nb_frames"]
        .as_str()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0);

    let (duration, frame_count) = match (duration, nb_frames) {
        (Some(duration), Some(frames)) => (duration, frames),
        (Some(duration), None) => (duration, (duration * fps).round() as u64),
        (None, Some(frames)) => (frames as f64 / fps, frames),
        (None, None) => {
            warn!("ffprobe reported neither duration nor frame count");
            return Err("unknown duration".to_string());
        }
    };

    Ok(VideoMetadata {
        duration,
        fps,
        width,
        height,
        codec,
        frame_count,
    })
}

/// Parse framerates such as "30000/1001" or "25"
fn parse_framerate(fps_str: &str) -> f64 {
    if let Some((num, den)) = fps_str.split_once('/') {
        let num: f64 = num.parse().unwrap_or(0.0);
        let den: f64 = den.parse().unwrap_or(0.0);
        return if den != 0.0 { num / den } else { 0.0 };
    }
    fps_str.parse().unwrap_or(0.0)
}

/// Synthetic in-memory video
///
/// Every frame is a solid color derived from its index, so tests can tell frames apart.
/// `truncated_after` simulates a corrupt file whose stream ends before `frame_count`.
pub struct MemoryFrameSource {
    metadata: VideoMetadata,
    position: u64,
    readable_frames: u64,
    closed: bool,
}

impl MemoryFrameSource {
    pub fn new(fps: f64, frame_count: u64) -> Self {
        Self {
            metadata: VideoMetadata {
                duration: frame_count as f64 / fps,
                fps,
                width: 8,
                height: 8,
                codec: "memory".to_string(),
                frame_count,
            },
            position: 0,
            readable_frames: frame_count,
            closed: false,
        }
    }

    /// Stop producing frames after `frames`, while still advertising the full frame count
    pub fn truncated_after(mut self, frames: u64) -> Self {
        self.readable_frames = frames.min(self.metadata.frame_count);
        self
    }

    /// Color used for the frame at `index`
    pub fn color_for(index: u64) -> [u8; 3] {
        [(index % 256) as u8, ((index / 256) % 256) as u8, 0]
    }

    fn advance(&mut self) -> Option<u64> {
        if self.closed || self.position >= self.readable_frames {
            return None;
        }
        let index = self.position;
        self.position += 1;
        Some(index)
    }
}

impl FrameSource for MemoryFrameSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.advance().map(|index| {
            Frame::new_filled(self.metadata.width, self.metadata.height, Self::color_for(index))
        }))
    }

    fn skip_frame(&mut self) -> Result<bool> {
        Ok(self.advance().is_some())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [{
            "codec_name": "h264",
            "width": 1280,
            "height": 720,
            "r_frame_rate": "25/1",
            "avg_frame_rate": "25/1",
            "duration": "120.000000",
            "nb_frames": "3000"
        }],
        "format": { "duration": "120.040000" }
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let metadata = parse_probe_output(PROBE_JSON).unwrap();
        assert_eq!(metadata.width, 1280);
        assert_eq!(metadata.height, 720);
        assert_eq!(metadata.fps, 25.0);
        assert_eq!(metadata.frame_count, 3000);
        assert_eq!(metadata.duration, 120.0);
        assert_eq!(metadata.codec, "h264");
    }

    #[test]
    fn test_parse_probe_falls_back_to_format_duration() {
        let json = r#"{
            "streams": [{ "width": 640, "height": 360, "r_frame_rate": "30000/1001" }],
            "format": { "duration": "10.0" }
        }"#;
        let metadata = parse_probe_output(json).unwrap();
        assert!((metadata.fps - 29.97).abs() < 0.01);
        assert_eq!(metadata.frame_count, 300);
    }

    #[test]
    fn test_parse_probe_rejects_missing_stream() {
        assert!(parse_probe_output(r#"{"streams": []}"#).is_err());
        assert!(parse_probe_output("not json").is_err());
    }

    #[test]
    fn test_parse_framerate() {
        assert_eq!(parse_framerate("30"), 30.0);
        assert_eq!(parse_framerate("50/2"), 25.0);
        assert_eq!(parse_framerate("0/0"), 0.0);
    }

    #[test]
    fn test_memory_source_truncation() {
        let mut source = MemoryFrameSource::new(10.0, 20).truncated_after(3);
        assert_eq!(source.metadata().frame_count, 20);

        let mut read = 0;
        while source.read_frame().unwrap().is_some() {
            read += 1;
        }
        assert_eq!(read, 3);
        assert!(!source.skip_frame().unwrap());
    }

    #[test]
    fn test_open_missing_file() {
        let result = FfmpegFrameSource::open("/no/such/video.mp4");
        assert!(matches!(
            result,
            Err(crate::error::HighlightsError::Video(VideoError::LoadFailed { .. }))
        ));
    }
}
