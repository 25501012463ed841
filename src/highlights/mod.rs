//! # Highlight Selection
//!
//! Decides which sampled timestamps are interesting, from scoreboard changes and
//! on-field objects.

pub mod selector;

pub use selector::{HighlightMark, HighlightReason, HighlightSelector, SelectionState, TimestampKey, Timestamped};
