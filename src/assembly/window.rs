use tracing::{debug, warn};

use crate::highlights::HighlightMark;

/// A range of the source video to copy into the highlights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start: f64,
    pub end: f64,
}

impl ClipWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// True when `other` starts before this window ends
    pub fn touches(&self, other: &ClipWindow) -> bool {
        other.start <= self.end
    }
}

/// Map highlight marks to clip windows of `clip_length` seconds
///
/// Windows are clamped to the video's end; marks at or past the end are
/// dropped. Overlapping windows stay separate unless `merge_overlaps` is set.
pub fn plan_windows(
    marks: &[HighlightMark],
    clip_length: f64,
    video_duration: f64,
    merge_overlaps: bool,
) -> Vec<ClipWindow> {
    let mut windows: Vec<ClipWindow> = marks
        .iter()
        .filter_map(|mark| {
            let start = mark.timestamp.max(0.0);
            if start >= video_duration {
                warn!(
                    "Dropping highlight at {:.2}s: past the end of the video ({:.2}s)",
                    mark.timestamp, video_duration
                );
                return None;
            }
            Some(ClipWindow::new(start, (start + clip_length).min(video_duration)))
        })
        .collect();

    windows.sort_by(|a, b| a.start.total_cmp(&b.start));

    if merge_overlaps {
        let before = windows.len();
        windows = merge_overlapping(windows);
        debug!("Merged {} clip windows into {}", before, windows.len());
    }

    windows
}

/// Collapse overlapping or adjacent windows; input must be sorted by start
pub fn merge_overlapping(windows: Vec<ClipWindow>) -> Vec<ClipWindow> {
    let mut merged: Vec<ClipWindow> = Vec::with_capacity(windows.len());

    for window in windows {
        match merged.last_mut() {
            Some(last) if last.touches(&window) => last.end = last.end.max(window.end),
            _ => merged.push(window),
        }
    }

    merged
}

/// Total length of the concatenated windows
pub fn total_duration(windows: &[ClipWindow]) -> f64 {
    windows.iter().map(ClipWindow::duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlights::HighlightReason;

    fn marks(timestamps: &[f64]) -> Vec<HighlightMark> {
        timestamps
            .iter()
            .map(|&timestamp| HighlightMark {
                timestamp,
                reason: HighlightReason::EventObject,
            })
            .collect()
    }

    #[test]
    fn test_fixed_length_windows() {
        let windows = plan_windows(&marks(&[10.0, 20.0]), 5.0, 30.0, false);
        assert_eq!(windows, vec![ClipWindow::new(10.0, 15.0), ClipWindow::new(20.0, 25.0)]);
        assert_eq!(total_duration(&windows), 10.0);
    }

    #[test]
    fn test_clamped_to_video_end() {
        let windows = plan_windows(&marks(&[27.0]), 5.0, 30.0, false);
        assert_eq!(windows, vec![ClipWindow::new(27.0, 30.0)]);
    }

    #[test]
    fn test_marks_past_end_are_dropped() {
        let windows = plan_windows(&marks(&[10.0, 30.0, 45.0]), 5.0, 30.0, false);
        assert_eq!(windows, vec![ClipWindow::new(10.0, 15.0)]);
    }

    #[test]
    fn test_overlaps_kept_by_default() {
        let windows = plan_windows(&marks(&[0.0, 2.0]), 5.0, 30.0, false);
        assert_eq!(windows, vec![ClipWindow::new(0.0, 5.0), ClipWindow::new(2.0, 7.0)]);
        assert_eq!(total_duration(&windows), 10.0);
    }

    #[test]
    fn test_merge_overlaps() {
        let windows = plan_windows(&marks(&[0.0, 2.0, 7.0, 20.0]), 5.0, 30.0, true);
        // [0,5) and [2,7) overlap, [7,12) touches the result
        assert_eq!(windows, vec![ClipWindow::new(0.0, 12.0), ClipWindow::new(20.0, 25.0)]);
    }

    #[test]
    fn test_windows_sorted_even_if_marks_are_not() {
        let windows = plan_windows(&marks(&[20.0, 10.0]), 5.0, 30.0, false);
        assert_eq!(windows[0].start, 10.0);
        assert_eq!(windows[1].start, 20.0);
    }

    #[test]
    fn test_no_marks() {
        assert!(plan_windows(&[], 5.0, 30.0, false).is_empty());
    }
}
