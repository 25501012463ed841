//! # Cricket Highlights
//!
//! Build a highlights reel from a full cricket match recording.
//!
//! Frames are sampled at a fixed interval, read by a vision service for
//! scoreboard text and on-field objects, and the interesting moments are cut
//! out of the source and joined into one video.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cricket_highlights::{
//!     analysis::GoogleVisionOracle,
//!     assembly::FfmpegEncoder,
//!     config::Config,
//!     pipeline::HighlightPipeline,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let oracle = Arc::new(GoogleVisionOracle::from_config(&config.analysis)?);
//!
//! let pipeline = HighlightPipeline::new(config, oracle, Arc::new(FfmpegEncoder::new()));
//! let report = pipeline.run("match.mp4", "highlights.mp4").await?;
//! println!("{} highlights", report.highlights.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Decoding and frame sampling
//! - [`analysis`] - Vision service boundary
//! - [`highlights`] - Highlight selection rules
//! - [`assembly`] - Clip cutting and concatenation
//! - [`pipeline`] - The end-to-end run
//! - [`config`] - Configuration management
//!
//! ## Plugging in another vision service
//!
//! Anything implementing [`VisionOracle`](analysis::VisionOracle) can stand in
//! for Google Cloud Vision:
//!
//! ```rust,no_run
//! use std::collections::BTreeSet;
//! use async_trait::async_trait;
//! use cricket_highlights::analysis::VisionOracle;
//! use cricket_highlights::error::AnalysisError;
//! use cricket_highlights::video::Frame;
//!
//! struct NoVision;
//!
//! #[async_trait]
//! impl VisionOracle for NoVision {
//!     fn name(&self) -> &str {
//!         "none"
//!     }
//!
//!     async fn detect_text(&self, _frame: &Frame) -> Result<String, AnalysisError> {
//!         Ok(String::new())
//!     }
//!
//!     async fn detect_objects(&self, _frame: &Frame) -> Result<BTreeSet<String>, AnalysisError> {
//!         Ok(BTreeSet::new())
//!     }
//! }
//! ```

pub mod analysis;
pub mod assembly;
pub mod config;
pub mod error;
pub mod highlights;
pub mod pipeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    analysis::VisionOracle,
    assembly::ClipEncoder,
    config::Config,
    error::{HighlightsError, Result},
    pipeline::{HighlightPipeline, PipelineReport},
};
