use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};

use crate::analysis::oracle::VisionOracle;
use crate::analysis::types::{AnalysisResult, FrameAnalysis};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::video::types::{Frame, SampledFrame};

/// Boundary between sampled frames and the vision service
///
/// Every oracle call is bounded by a timeout. Failed frames degrade to an empty
/// result so one bad request never stops a run. Concurrent requests are allowed,
/// but results always come back in the order the frames went in.
pub struct FrameAnalyzer {
    oracle: Arc<dyn VisionOracle>,
    timeout: Duration,
    max_concurrent: usize,
}

impl FrameAnalyzer {
    pub fn new(oracle: Arc<dyn VisionOracle>, timeout: Duration) -> Self {
        Self {
            oracle,
            timeout,
            max_concurrent: 1,
        }
    }

    pub fn from_config(oracle: Arc<dyn VisionOracle>, config: &AnalysisConfig) -> Self {
        Self::new(oracle, Duration::from_secs_f64(config.timeout_seconds))
            .with_concurrency(config.max_concurrent_requests)
    }

    /// Allow up to `requests` frames in flight
    pub fn with_concurrency(mut self, requests: usize) -> Self {
        self.max_concurrent = requests.max(1);
        self
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, AnalysisError>
    where
        F: Future<Output = Result<T, AnalysisError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| AnalysisError::Timeout { seconds: self.timeout.as_secs_f64() })?
    }

    /// Ask the oracle for text and objects in one frame
    pub async fn analyze(&self, frame: &Frame) -> Result<AnalysisResult, AnalysisError> {
        let (text, objects) = tokio::join!(
            self.bounded(self.oracle.detect_text(frame)),
            self.bounded(self.oracle.detect_objects(frame)),
        );

        Ok(AnalysisResult {
            text: text?,
            objects: objects?,
        })
    }

    /// Analyse a sampled frame, falling back to an empty result on failure
    pub async fn analyze_or_empty(&self, sample: &SampledFrame) -> FrameAnalysis {
        let (result, degraded) = match self.analyze(&sample.image).await {
            Ok(result) => (result, false),
            Err(e) => {
                warn!(
                    "Analysis unavailable for frame {} (t={:.2}s), treating as empty: {}",
                    sample.index, sample.timestamp, e
                );
                (AnalysisResult::empty(), true)
            }
        };

        debug!(
            "Frame {} (t={:.2}s): text={:?} objects={:?}",
            sample.index, sample.timestamp, result.text, result.objects
        );

        FrameAnalysis {
            timestamp: sample.timestamp,
            index: sample.index,
            result,
            degraded,
        }
    }

    /// Analyse a stream of frames, yielding results in input order
    pub fn analyze_stream<'a, S>(&'a self, frames: S) -> impl Stream<Item = FrameAnalysis> + 'a
    where
        S: Stream<Item = SampledFrame> + 'a,
    {
        frames
            .map(move |sample| async move { self.analyze_or_empty(&sample).await })
            .buffered(self.max_concurrent)
    }

    /// Analyse a finite batch of frames
    pub async fn analyze_all<I>(&self, frames: I) -> Vec<FrameAnalysis>
    where
        I: IntoIterator<Item = SampledFrame>,
    {
        self.analyze_stream(stream::iter(frames)).collect().await
    }
}
