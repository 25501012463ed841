use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::assembly::encoder::ClipEncoder;
use crate::assembly::window::{plan_windows, total_duration, ClipWindow};
use crate::config::AssemblyConfig;
use crate::error::{AssemblyError, ConfigError, Result};
use crate::highlights::HighlightMark;

/// The written highlights video
#[derive(Debug, Clone)]
pub struct AssembledVideo {
    pub path: PathBuf,
    pub windows: Vec<ClipWindow>,
    /// Sum of the window lengths
    pub duration: f64,
}

/// Cuts a clip after every highlight and joins them into one video
pub struct ClipAssembler {
    encoder: Arc<dyn ClipEncoder>,
    config: AssemblyConfig,
    temp_dir: Option<TempDir>,
}

impl ClipAssembler {
    pub fn new(encoder: Arc<dyn ClipEncoder>, config: AssemblyConfig) -> Self {
        Self {
            encoder,
            config,
            temp_dir: None,
        }
    }

    /// Scratch directory private to this assembler
    fn ensure_temp_dir(&mut self) -> std::result::Result<PathBuf, AssemblyError> {
        if let Some(ref temp_dir) = self.temp_dir {
            return Ok(temp_dir.path().to_path_buf());
        }

        let parent = self.config.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let temp_dir = std::fs::create_dir_all(&parent)
            .and_then(|_| tempfile::Builder::new().prefix("cricket_highlights_").tempdir_in(&parent))
            .map_err(|e| AssemblyError::EncodingFailed {
                reason: format!("Cannot create scratch directory in {}: {}", parent.display(), e),
            })?;

        let path = temp_dir.path().to_path_buf();
        debug!("Scratch directory {:?}", path);
        self.temp_dir = Some(temp_dir);
        Ok(path)
    }

    /// Cut `marks` out of `source` and write them, in time order, to `output`
    ///
    /// Fails with [`AssemblyError::NoHighlightsFound`] when no window survives
    /// clamping; nothing is written in that case.
    pub async fn assemble(
        &mut self,
        source: &Path,
        video_duration: f64,
        marks: &[HighlightMark],
        output: &Path,
    ) -> Result<AssembledVideo> {
        let clip_length = self.config.clip_length_seconds;
        if !(clip_length > 0.0) || !clip_length.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "assembly.clip_length_seconds".to_string(),
                value: clip_length.to_string(),
            }
            .into());
        }

        let windows = plan_windows(marks, clip_length, video_duration, self.config.merge_overlaps);
        if windows.is_empty() {
            return Err(AssemblyError::NoHighlightsFound.into());
        }

        info!(
            "Assembling {} clips ({:.1}s total) from {} highlights",
            windows.len(),
            total_duration(&windows),
            marks.len()
        );

        let result = self.encode(source, &windows, output).await;
        self.cleanup();

        if let Err(e) = result {
            // A partial file is worse than none
            if output.exists() {
                if let Err(remove_err) = std::fs::remove_file(output) {
                    warn!("Could not remove incomplete output {:?}: {}", output, remove_err);
                }
            }
            return Err(e);
        }

        Ok(AssembledVideo {
            path: output.to_path_buf(),
            duration: total_duration(&windows),
            windows,
        })
    }

    async fn encode(&mut self, source: &Path, windows: &[ClipWindow], output: &Path) -> Result<()> {
        let temp_dir = self.ensure_temp_dir()?;
        let mut clips = Vec::with_capacity(windows.len());

        for (i, window) in windows.iter().enumerate() {
            let clip_path = temp_dir.join(format!("clip_{:04}.mp4", i));
            debug!("Clip {}: {:.2}s-{:.2}s", i, window.start, window.end);
            self.encoder.extract_clip(source, window, &clip_path).await?;
            clips.push(clip_path);
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AssemblyError::EncodingFailed {
                reason: format!("Cannot create output directory {}: {}", parent.display(), e),
            })?;
        }

        self.encoder.concatenate(&clips, output, &self.config.codec).await?;
        Ok(())
    }

    pub fn cleanup(&mut self) {
        if let Some(temp_dir) = self.temp_dir.take() {
            if let Err(e) = temp_dir.close() {
                warn!("Failed to remove temporary directory: {}", e);
            }
        }
    }
}

impl Drop for ClipAssembler {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlights::HighlightReason;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingEncoder {
        extracted: Mutex<Vec<ClipWindow>>,
        concatenated: Mutex<Vec<(usize, String)>>,
        fail_concat: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ClipEncoder for RecordingEncoder {
        async fn extract_clip(&self, _source: &Path, window: &ClipWindow, dest: &Path) -> std::result::Result<(), AssemblyError> {
            self.extracted.lock().unwrap().push(*window);
            std::fs::write(dest, b"clip").unwrap();
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        }

        async fn concatenate(&self, clips: &[PathBuf], output: &Path, codec: &str) -> std::result::Result<(), AssemblyError> {
            if let Some(missing) = clips.iter().find(|clip| !clip.exists()) {
                return Err(AssemblyError::EncodingFailed {
                    reason: format!("{} vanished", missing.display()),
                });
            }

            // Leave a partial file behind before failing
            std::fs::write(output, b"partial").unwrap();
            if self.fail_concat {
                return Err(AssemblyError::EncodingFailed { reason: "disk full".to_string() });
            }
            self.concatenated.lock().unwrap().push((clips.len(), codec.to_string()));
            Ok(())
        }
    }

    fn marks(timestamps: &[f64]) -> Vec<HighlightMark> {
        timestamps
            .iter()
            .map(|&timestamp| HighlightMark { timestamp, reason: HighlightReason::EventObject })
            .collect()
    }

    fn config(dir: &Path) -> AssemblyConfig {
        AssemblyConfig {
            temp_dir: Some(dir.to_path_buf()),
            ..AssemblyConfig::default()
        }
    }

    #[tokio::test]
    async fn test_assemble_in_time_order() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(RecordingEncoder::default());
        let mut assembler = ClipAssembler::new(encoder.clone(), config(dir.path()));
        let output = dir.path().join("out.mp4");

        let video = assembler
            .assemble(Path::new("match.mp4"), 30.0, &marks(&[10.0, 20.0]), &output)
            .await
            .unwrap();

        assert_eq!(video.duration, 10.0);
        assert_eq!(
            *encoder.extracted.lock().unwrap(),
            vec![ClipWindow::new(10.0, 15.0), ClipWindow::new(20.0, 25.0)]
        );
        assert_eq!(*encoder.concatenated.lock().unwrap(), vec![(2, "libx264".to_string())]);

        // Intermediate clips are gone, only the output is left
        let leftovers: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(leftovers, vec![output]);
    }

    #[tokio::test]
    async fn test_concurrent_assemblers_use_separate_scratch_dirs() {
        let dir = tempdir().unwrap();
        let fast = Arc::new(RecordingEncoder { delay: Some(Duration::from_millis(1)), ..Default::default() });
        let slow = Arc::new(RecordingEncoder { delay: Some(Duration::from_millis(50)), ..Default::default() });
        let mut first = ClipAssembler::new(fast, config(dir.path()));
        let mut second = ClipAssembler::new(slow, config(dir.path()));
        let first_out = dir.path().join("first.mp4");
        let second_out = dir.path().join("second.mp4");
        let first_marks = marks(&[1.0, 10.0]);
        let second_marks = marks(&[2.0, 12.0]);

        let (a, b) = tokio::join!(
            first.assemble(Path::new("a.mp4"), 30.0, &first_marks, &first_out),
            second.assemble(Path::new("b.mp4"), 30.0, &second_marks, &second_out),
        );

        assert_eq!(a.unwrap().windows.len(), 2);
        assert_eq!(b.unwrap().windows.len(), 2);
    }

    #[tokio::test]
    async fn test_unwritable_scratch_dir_is_encoding_failure() {
        let dir = tempdir().unwrap();
        let not_a_dir = dir.path().join("blocker");
        std::fs::write(&not_a_dir, b"").unwrap();
        let mut assembler = ClipAssembler::new(Arc::new(RecordingEncoder::default()), config(&not_a_dir));

        let err = assembler
            .assemble(Path::new("match.mp4"), 30.0, &marks(&[5.0]), &dir.path().join("out.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::HighlightsError::Assembly(AssemblyError::EncodingFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_is_encoding_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let mut assembler = ClipAssembler::new(Arc::new(RecordingEncoder::default()), config(dir.path()));

        let err = assembler
            .assemble(Path::new("match.mp4"), 30.0, &marks(&[5.0]), &blocker.join("out.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::HighlightsError::Assembly(AssemblyError::EncodingFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_marks_is_no_highlights() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(RecordingEncoder::default());
        let mut assembler = ClipAssembler::new(encoder.clone(), config(dir.path()));
        let output = dir.path().join("out.mp4");

        let err = assembler.assemble(Path::new("match.mp4"), 30.0, &[], &output).await.unwrap_err();
        assert!(err.is_no_highlights());
        assert!(!output.exists());
        assert!(encoder.extracted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_marks_past_end_is_no_highlights() {
        let dir = tempdir().unwrap();
        let mut assembler = ClipAssembler::new(Arc::new(RecordingEncoder::default()), config(dir.path()));

        let err = assembler
            .assemble(Path::new("match.mp4"), 30.0, &marks(&[30.0, 31.0]), &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(err.is_no_highlights());
    }

    #[tokio::test]
    async fn test_encoding_failure_removes_partial_output() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(RecordingEncoder { fail_concat: true, ..Default::default() });
        let mut assembler = ClipAssembler::new(encoder, config(dir.path()));
        let output = dir.path().join("out.mp4");

        let err = assembler
            .assemble(Path::new("match.mp4"), 30.0, &marks(&[5.0]), &output)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::HighlightsError::Assembly(AssemblyError::EncodingFailed { .. })
        ));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_merge_overlaps_flag() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(RecordingEncoder::default());
        let mut assembly = config(dir.path());
        assembly.merge_overlaps = true;
        let mut assembler = ClipAssembler::new(encoder.clone(), assembly);

        let video = assembler
            .assemble(Path::new("match.mp4"), 30.0, &marks(&[0.0, 3.0]), &dir.path().join("out.mp4"))
            .await
            .unwrap();

        assert_eq!(video.windows, vec![ClipWindow::new(0.0, 8.0)]);
        assert_eq!(video.duration, 8.0);
    }
}
