//! Turns per-frame analysis into highlight timestamps.
//!
//! Two rules are checked for every frame, independently:
//!
//! 1. **Scoreboard change** - the text contains a scoreboard indicator and
//!    differs from the last scoreboard reading. Only a matching reading
//!    updates the remembered text, so frames without a scoreboard never reset it.
//! 2. **Event object** - any recognised object is in the event set.
//!
//! Selection is a left fold over the frames in timestamp order, carrying a
//! [`SelectionState`]. Marks live in a map keyed by [`TimestampKey`], which
//! makes them unique per timestamp and ascending by construction.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::analysis::types::{AnalysisResult, FrameAnalysis};
use crate::config::AnalysisConfig;
use crate::video::types::SampledFrame;

/// Anything positioned on the source timeline
pub trait Timestamped {
    /// Seconds from the start of the source video
    fn timestamp(&self) -> f64;
}

impl Timestamped for f64 {
    fn timestamp(&self) -> f64 {
        *self
    }
}

impl Timestamped for SampledFrame {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

impl Timestamped for FrameAnalysis {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

impl<T: Timestamped> Timestamped for &T {
    fn timestamp(&self) -> f64 {
        (**self).timestamp()
    }
}

/// Millisecond-resolution timestamp with a total order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimestampKey(i64);

impl TimestampKey {
    pub fn from_seconds(seconds: f64) -> Self {
        Self((seconds * 1000.0).round() as i64)
    }
}

/// Which rule put a frame on the highlight list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightReason {
    ScoreboardChange,
    EventObject,
    Both,
}

impl HighlightReason {
    fn combine(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Self::Both
        }
    }
}

/// A timestamp judged worth including in the highlights
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightMark {
    pub timestamp: f64,
    pub reason: HighlightReason,
}

/// Accumulator threaded through the selection fold
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    previous_scoreboard_text: String,
    marks: BTreeMap<TimestampKey, HighlightMark>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last scoreboard reading that triggered a mark
    pub fn previous_scoreboard_text(&self) -> &str {
        &self.previous_scoreboard_text
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Marks in ascending timestamp order
    pub fn into_marks(self) -> Vec<HighlightMark> {
        self.marks.into_values().collect()
    }

    fn mark(&mut self, timestamp: f64, reason: HighlightReason) {
        self.marks
            .entry(TimestampKey::from_seconds(timestamp))
            .and_modify(|existing| existing.reason = existing.reason.combine(reason))
            .or_insert(HighlightMark { timestamp, reason });
    }
}

/// Scoreboard-change and event-object heuristics
#[derive(Debug, Clone)]
pub struct HighlightSelector {
    scoreboard_indicators: Vec<String>,
    event_objects: BTreeSet<String>,
}

impl Default for HighlightSelector {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl HighlightSelector {
    pub fn new<I, J, S, T>(scoreboard_indicators: I, event_objects: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            // Empty indicators would match any text, including none at all
            scoreboard_indicators: scoreboard_indicators
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
            event_objects: event_objects.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.scoreboard_indicators.iter().cloned(), config.event_objects.iter().cloned())
    }

    /// True when `text` looks like a scoreboard reading
    pub fn is_scoreboard(&self, text: &str) -> bool {
        self.scoreboard_indicators.iter().any(|indicator| text.contains(indicator.as_str()))
    }

    /// True when any label is one of the event objects
    pub fn has_event_object(&self, objects: &BTreeSet<String>) -> bool {
        !self.event_objects.is_disjoint(objects)
    }

    /// Fold one analysed frame into the selection state
    pub fn step(&self, mut state: SelectionState, timestamp: f64, result: &AnalysisResult) -> SelectionState {
        if self.is_scoreboard(&result.text) && result.text != state.previous_scoreboard_text {
            info!("Score change detected at {:.1}s: {:?}", timestamp, result.text);
            state.previous_scoreboard_text = result.text.clone();
            state.mark(timestamp, HighlightReason::ScoreboardChange);
        }

        if self.has_event_object(&result.objects) {
            debug!("Event objects at {:.1}s: {:?}", timestamp, result.objects);
            state.mark(timestamp, HighlightReason::EventObject);
        }

        state
    }

    /// Select highlights from frames given in ascending timestamp order
    pub fn select<I, T>(&self, frames: I) -> Vec<HighlightMark>
    where
        I: IntoIterator<Item = (T, AnalysisResult)>,
        T: Timestamped,
    {
        frames
            .into_iter()
            .fold(SelectionState::new(), |state, (frame, result)| {
                self.step(state, frame.timestamp(), &result)
            })
            .into_marks()
    }

    /// Select highlights from analysed frames
    pub fn select_analyses<'a, I>(&self, analyses: I) -> Vec<HighlightMark>
    where
        I: IntoIterator<Item = &'a FrameAnalysis>,
    {
        analyses
            .into_iter()
            .fold(SelectionState::new(), |state, analysis| {
                self.step(state, analysis.timestamp, &analysis.result)
            })
            .into_marks()
    }
}
