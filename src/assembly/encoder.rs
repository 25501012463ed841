use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use async_trait::async_trait;
use tokio::task;
use tracing::debug;

use crate::assembly::window::ClipWindow;
use crate::error::AssemblyError;

/// Video encoding backend used to cut and join highlight clips
#[async_trait]
pub trait ClipEncoder: Send + Sync {
    /// Write `window` of `source` to `dest` as a standalone clip
    async fn extract_clip(&self, source: &Path, window: &ClipWindow, dest: &Path) -> Result<(), AssemblyError>;

    /// Join `clips`, in order, into `output` encoded with `codec`
    async fn concatenate(&self, clips: &[PathBuf], output: &Path, codec: &str) -> Result<(), AssemblyError>;
}

/// Codec for the intermediate per-window clips
const CLIP_CODEC: &str = "libx264";

/// Encoder driving the `ffmpeg` command-line tool
#[derive(Debug, Default)]
pub struct FfmpegEncoder;

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn check_ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn run(mut cmd: Command) -> Result<(), AssemblyError> {
        let output = task::spawn_blocking(move || cmd.output()).await
            .map_err(|e| AssemblyError::EncodingFailed {
                reason: format!("Failed to spawn FFmpeg process: {}", e),
            })?
            .map_err(|e| AssemblyError::EncodingFailed {
                reason: format!("FFmpeg execution failed: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AssemblyError::EncodingFailed {
                reason: format!("FFmpeg failed: {}", stderr.trim()),
            });
        }

        Ok(())
    }

    fn write_concat_list(clips: &[PathBuf], list_path: &Path) -> Result<(), AssemblyError> {
        let write = || -> std::io::Result<()> {
            let mut file = File::create(list_path)?;
            for clip in clips {
                let absolute_path = clip.canonicalize().unwrap_or_else(|_| clip.clone());
                // Single quotes inside concat-list paths are escaped as '\''
                let escaped = absolute_path.display().to_string().replace('\'', "'\\''");
                writeln!(file, "file '{}'", escaped)?;
            }
            Ok(())
        };

        write().map_err(|e| AssemblyError::EncodingFailed {
            reason: format!("Failed to write concat list {}: {}", list_path.display(), e),
        })
    }

    fn remove_concat_list(list_path: &Path) {
        if let Err(e) = std::fs::remove_file(list_path) {
            debug!("Could not remove concat list {}: {}", list_path.display(), e);
        }
    }
}

#[async_trait]
impl ClipEncoder for FfmpegEncoder {
    async fn extract_clip(&self, source: &Path, window: &ClipWindow, dest: &Path) -> Result<(), AssemblyError> {
        debug!("Extracting {:.2}s-{:.2}s to {}", window.start, window.end, dest.display());

        let start = format!("{:.3}", window.start);
        let length = format!("{:.3}", window.duration());

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin", "-ss", start.as_str(), "-i"])
            .arg(source)
            .args([
                "-t", length.as_str(),
                "-c:v", CLIP_CODEC,
                "-pix_fmt", "yuv420p",
                "-c:a", "aac",
                "-avoid_negative_ts", "make_zero",
                "-y",
            ])
            .arg(dest);

        Self::run(cmd).await
    }

    async fn concatenate(&self, clips: &[PathBuf], output: &Path, codec: &str) -> Result<(), AssemblyError> {
        if !Self::check_ffmpeg_available() {
            return Err(AssemblyError::EncodingFailed {
                reason: "FFmpeg not found. Please install FFmpeg.".to_string(),
            });
        }

        let list_path = output.with_extension("concat.txt");
        Self::write_concat_list(clips, &list_path)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin", "-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .args(["-c:v", codec, "-pix_fmt", "yuv420p", "-c:a", "aac", "-y"])
            .arg(output);

        let result = Self::run(cmd).await;
        Self::remove_concat_list(&list_path);
        result
    }
}
