use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::analysis::types::AnalysisResult;
use crate::error::AnalysisError;
use crate::video::types::Frame;

/// Text and object recognition over a single frame
///
/// The two capabilities are separate calls and may fail independently.
#[async_trait]
pub trait VisionOracle: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// All text found in the frame, `""` when there is none
    async fn detect_text(&self, frame: &Frame) -> Result<String, AnalysisError>;

    /// Labels of the objects found in the frame
    async fn detect_objects(&self, frame: &Frame) -> Result<BTreeSet<String>, AnalysisError>;
}

/// Deterministic oracle for tests and offline runs
///
/// Responses are keyed by the color of a frame's top-left pixel, which is how
/// [`MemoryFrameSource`](crate::video::MemoryFrameSource) tells its frames apart.
/// Unknown frames analyse as empty.
#[derive(Default)]
pub struct StubOracle {
    responses: HashMap<[u8; 3], AnalysisResult>,
    failing: HashSet<[u8; 3]>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `result` for frames whose top-left pixel is `color`
    pub fn with_response(mut self, color: [u8; 3], result: AnalysisResult) -> Self {
        self.responses.insert(color, result);
        self
    }

    /// Report the service as unreachable for frames of this color
    pub fn failing_on(mut self, color: [u8; 3]) -> Self {
        self.failing.insert(color);
        self
    }

    /// Sleep before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of detect calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn lookup(&self, frame: &Frame) -> Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let key = frame.as_image().get_pixel(0, 0).0;
        if self.failing.contains(&key) {
            return Err(AnalysisError::Unreachable {
                reason: "stub configured to fail".to_string(),
            });
        }
        Ok(self.responses.get(&key).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl VisionOracle for StubOracle {
    fn name(&self) -> &str {
        "stub"
    }

    async fn detect_text(&self, frame: &Frame) -> Result<String, AnalysisError> {
        Ok(self.lookup(frame).await?.text)
    }

    async fn detect_objects(&self, frame: &Frame) -> Result<BTreeSet<String>, AnalysisError> {
        Ok(self.lookup(frame).await?.objects)
    }
}
