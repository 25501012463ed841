//! # Video Module
//!
//! Decoding the source video and sampling frames from it.

pub mod sampler;
pub mod source;
pub mod types;

pub use sampler::FrameSampler;
pub use source::{FfmpegFrameSource, FrameSource, MemoryFrameSource};
pub use types::{Frame, SampledFrame, VideoMetadata};
