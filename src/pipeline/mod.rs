//! # Highlights Pipeline
//!
//! Sampling, analysis, selection and assembly wired into a single run.

pub mod engine;

pub use engine::{HighlightPipeline, PipelineReport};
