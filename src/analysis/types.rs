use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// What the vision service saw in one frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Recognised text, empty when none was detected
    pub text: String,

    /// Recognised object labels, empty when none were detected
    pub objects: BTreeSet<String>,
}

impl AnalysisResult {
    pub fn new(text: impl Into<String>, objects: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            text: text.into(),
            objects: objects.into_iter().map(Into::into).collect(),
        }
    }

    /// No text and no objects; the stand-in for a frame the service could not analyse
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.objects.is_empty()
    }
}

/// Analysis of one sampled frame, detached from its raster
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub timestamp: f64,
    pub index: u64,
    pub result: AnalysisResult,

    /// True when the service failed and `result` is the empty fallback
    pub degraded: bool,
}
