use std::path::Path;
use std::sync::Arc;

use futures::future;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};

use crate::{
    analysis::{FrameAnalyzer, VisionOracle},
    assembly::{AssembledVideo, ClipAssembler, ClipEncoder},
    config::Config,
    error::{HighlightsError, Result},
    highlights::{HighlightMark, HighlightSelector, SelectionState},
    video::{FfmpegFrameSource, FrameSampler, FrameSource, SampledFrame},
};

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub frames_sampled: usize,
    /// Frames whose analysis failed and were treated as empty
    pub analysis_failures: usize,
    /// True when the source stopped decoding before its advertised length
    pub ended_early: bool,
    pub highlights: Vec<HighlightMark>,
    pub output: AssembledVideo,
}

struct SamplingSummary {
    emitted: usize,
    ended_early: bool,
}

/// Drives a single highlights run
///
/// The pipeline is a one-way chain:
/// 1. Sampling - decode the source and keep one frame per interval
/// 2. Analysis - ask the vision service about each sampled frame
/// 3. Selection - fold the analyses into highlight timestamps
/// 4. Assembly - cut a clip after each highlight and join them
///
/// Sampling runs on a blocking thread and feeds analysis through a bounded
/// channel, so only a handful of decoded frames are alive at a time. Analysis
/// may overlap requests, but selection always sees frames in timestamp order.
pub struct HighlightPipeline {
    config: Config,
    oracle: Arc<dyn VisionOracle>,
    encoder: Arc<dyn ClipEncoder>,
    selector: HighlightSelector,
}

impl HighlightPipeline {
    pub fn new(config: Config, oracle: Arc<dyn VisionOracle>, encoder: Arc<dyn ClipEncoder>) -> Self {
        let selector = HighlightSelector::from_config(&config.analysis);
        Self {
            config,
            oracle,
            encoder,
            selector,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a highlights video for `input` at `output`
    pub async fn run<P: AsRef<Path>>(&self, input: P, output: P) -> Result<PipelineReport> {
        let input = input.as_ref();
        self.config.validate()?;

        info!("Opening {:?}", input);
        let source = FfmpegFrameSource::open(input)?;
        self.run_with_source(source, input, output.as_ref()).await
    }

    /// Run the pipeline over an already opened source
    ///
    /// `input` is handed to the encoder when cutting clips.
    pub async fn run_with_source<S>(&self, source: S, input: &Path, output: &Path) -> Result<PipelineReport>
    where
        S: FrameSource + 'static,
    {
        self.config.validate()?;

        info!("Starting highlights run");
        info!("   Input: {:?}", input);
        info!("   Output: {:?}", output);
        info!("   Vision service: {}", self.oracle.name());

        let video_duration = source.metadata().duration;

        // Sampling feeds analysis, which feeds selection as results arrive
        let (state, failures, summary) = self.sample_analyze_select(source).await?;

        info!(
            "Sampled {} frames, {} analysis failures{}",
            summary.emitted,
            failures,
            if summary.ended_early { " (stream ended early)" } else { "" }
        );

        info!("🏏 Step 3: Selecting highlights...");
        let highlights = state.into_marks();
        info!("Selected {} highlights", highlights.len());
        for mark in &highlights {
            debug!("   {:.2}s ({:?})", mark.timestamp, mark.reason);
        }

        info!("🎬 Step 4: Assembling highlights video...");
        let mut assembler = ClipAssembler::new(self.encoder.clone(), self.config.assembly.clone());
        let assembled = assembler.assemble(input, video_duration, &highlights, output).await?;

        info!(
            "Highlights saved to {:?}: {} clips, {:.1}s",
            assembled.path,
            assembled.windows.len(),
            assembled.duration
        );

        Ok(PipelineReport {
            frames_sampled: summary.emitted,
            analysis_failures: failures,
            ended_early: summary.ended_early,
            highlights,
            output: assembled,
        })
    }

    async fn sample_analyze_select<S>(&self, source: S) -> Result<(SelectionState, usize, SamplingSummary)>
    where
        S: FrameSource + 'static,
    {
        let sampling = &self.config.sampling;
        let mut sampler = FrameSampler::new(source, sampling.interval_seconds)?;
        if let Some(dir) = &sampling.frames_dir {
            info!("Persisting sampled frames to {:?}", dir);
            sampler = sampler.with_frames_dir(dir);
        }

        let analyzer = FrameAnalyzer::from_config(self.oracle.clone(), &self.config.analysis);
        let (tx, rx) = mpsc::channel::<SampledFrame>(self.config.analysis.max_concurrent_requests * 2);

        info!("🎞️  Step 1: Sampling frames every {:.2}s...", sampling.interval_seconds);
        info!(
            "🔍 Step 2: Analysing frames with {} (up to {} at once)...",
            self.oracle.name(),
            self.config.analysis.max_concurrent_requests
        );

        let producer = task::spawn_blocking(move || {
            for frame in sampler.by_ref() {
                if tx.blocking_send(frame).is_err() {
                    warn!("Analysis stopped early; abandoning sampling");
                    break;
                }
            }
            SamplingSummary {
                emitted: sampler.emitted(),
                ended_early: sampler.ended_early(),
            }
        });

        let frames = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });

        let selector = &self.selector;
        let (state, failures) = analyzer
            .analyze_stream(frames)
            .fold((SelectionState::new(), 0usize), |(state, failures), analysis| {
                let state = selector.step(state, analysis.timestamp, &analysis.result);
                future::ready((state, failures + usize::from(analysis.degraded)))
            })
            .await;

        let summary = producer
            .await
            .map_err(|e| HighlightsError::generic(format!("sampling task failed: {}", e)))?;

        Ok((state, failures, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisResult, StubOracle};
    use crate::assembly::{ClipWindow, FfmpegEncoder};
    use crate::error::AssemblyError;
    use crate::highlights::HighlightReason;
    use crate::video::MemoryFrameSource;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingEncoder {
        windows: Mutex<Vec<ClipWindow>>,
    }

    #[async_trait]
    impl ClipEncoder for RecordingEncoder {
        async fn extract_clip(&self, _source: &Path, window: &ClipWindow, dest: &Path) -> std::result::Result<(), AssemblyError> {
            self.windows.lock().unwrap().push(*window);
            std::fs::write(dest, b"clip").unwrap();
            Ok(())
        }

        async fn concatenate(&self, _clips: &[PathBuf], output: &Path, _codec: &str) -> std::result::Result<(), AssemblyError> {
            std::fs::write(output, b"highlights").unwrap();
            Ok(())
        }
    }

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.assembly.temp_dir = Some(dir.to_path_buf());
        config.analysis.max_concurrent_requests = 3;
        config
    }

    fn color(index: u64) -> [u8; 3] {
        MemoryFrameSource::color_for(index)
    }

    #[tokio::test]
    async fn test_event_objects_become_clips() {
        let dir = tempdir().unwrap();
        let oracle = StubOracle::new()
            .with_response(color(100), AnalysisResult::new("", ["Bat"]))
            .with_response(color(200), AnalysisResult::new("", ["Bat"]));
        let encoder = Arc::new(RecordingEncoder::default());
        let pipeline = HighlightPipeline::new(config(dir.path()), Arc::new(oracle), encoder.clone());
        let output = dir.path().join("out.mp4");

        // 30s at 10fps, one sample every 5s
        let report = pipeline
            .run_with_source(MemoryFrameSource::new(10.0, 300), Path::new("match.mp4"), &output)
            .await
            .unwrap();

        assert_eq!(report.frames_sampled, 6);
        assert_eq!(report.analysis_failures, 0);
        assert!(!report.ended_early);
        let timestamps: Vec<f64> = report.highlights.iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![10.0, 20.0]);
        assert_eq!(
            *encoder.windows.lock().unwrap(),
            vec![ClipWindow::new(10.0, 15.0), ClipWindow::new(20.0, 25.0)]
        );
        assert_eq!(report.output.duration, 10.0);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_failed_frames_are_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let oracle = StubOracle::new()
            .with_response(color(50), AnalysisResult::new("Score 1/0", Vec::<String>::new()))
            .with_response(color(150), AnalysisResult::new("Score 7/0", Vec::<String>::new()))
            .failing_on(color(150))
            .with_response(color(250), AnalysisResult::new("Score 7/0", Vec::<String>::new()));
        let pipeline = HighlightPipeline::new(
            config(dir.path()),
            Arc::new(oracle),
            Arc::new(RecordingEncoder::default()),
        );

        let report = pipeline
            .run_with_source(MemoryFrameSource::new(10.0, 300), Path::new("match.mp4"), &dir.path().join("out.mp4"))
            .await
            .unwrap();

        assert_eq!(report.analysis_failures, 1);
        let timestamps: Vec<f64> = report.highlights.iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![5.0, 25.0]);
        assert!(report.highlights.iter().all(|m| m.reason == HighlightReason::ScoreboardChange));
    }

    #[tokio::test]
    async fn test_truncated_stream_keeps_earlier_highlights() {
        let dir = tempdir().unwrap();
        let oracle = StubOracle::new().with_response(color(100), AnalysisResult::new("", ["Ball"]));
        let pipeline = HighlightPipeline::new(
            config(dir.path()),
            Arc::new(oracle),
            Arc::new(RecordingEncoder::default()),
        );

        let report = pipeline
            .run_with_source(
                MemoryFrameSource::new(10.0, 300).truncated_after(120),
                Path::new("match.mp4"),
                &dir.path().join("out.mp4"),
            )
            .await
            .unwrap();

        assert!(report.ended_early);
        assert_eq!(report.frames_sampled, 3);
        assert_eq!(report.highlights.len(), 1);
        assert_eq!(report.output.windows, vec![ClipWindow::new(10.0, 15.0)]);
    }

    #[tokio::test]
    async fn test_invalid_interval_fails_before_decoding() {
        let mut config = Config::default();
        config.sampling.interval_seconds = 0.0;
        let oracle = Arc::new(StubOracle::new());
        let pipeline = HighlightPipeline::new(config, oracle.clone(), Arc::new(FfmpegEncoder::new()));

        let err = pipeline
            .run_with_source(MemoryFrameSource::new(10.0, 300), Path::new("in.mp4"), Path::new("out.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, HighlightsError::Config(_)));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_quiet_video_reports_no_highlights() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let encoder = Arc::new(RecordingEncoder::default());
        let pipeline = HighlightPipeline::new(config(dir.path()), Arc::new(StubOracle::new()), encoder.clone());

        let err = pipeline
            .run_with_source(MemoryFrameSource::new(10.0, 300), Path::new("in.mp4"), &output)
            .await
            .unwrap_err();

        assert!(err.is_no_highlights());
        assert_eq!(err.exit_code(), 2);
        assert!(encoder.windows.lock().unwrap().is_empty());
        assert!(!output.exists());
    }
}
