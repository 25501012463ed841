//! # Clip Assembly
//!
//! Maps highlight timestamps to fixed-length windows of the source video and
//! joins them into the final highlights reel.

pub mod assembler;
pub mod encoder;
pub mod window;

pub use assembler::{AssembledVideo, ClipAssembler};
pub use encoder::{ClipEncoder, FfmpegEncoder};
pub use window::{merge_overlapping, plan_windows, ClipWindow};
