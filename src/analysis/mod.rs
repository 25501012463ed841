//! # Frame Analysis
//!
//! Wraps the external vision service that reads text and object labels off a frame.

pub mod adapter;
pub mod google;
pub mod oracle;
pub mod types;

pub use adapter::FrameAnalyzer;
pub use google::GoogleVisionOracle;
pub use oracle::{StubOracle, VisionOracle};
pub use types::{AnalysisResult, FrameAnalysis};
