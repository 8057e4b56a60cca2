//! Caption lookup on the recording timeline.

use sheen_project_model::event::{CaptionSegment, TimestampNs};

/// The caption active at `t_ns`, if any.
///
/// `segments` must be sorted by start time. When segments overlap the one
/// that started most recently wins.
pub fn active_caption(segments: &[CaptionSegment], t_ns: TimestampNs) -> Option<&CaptionSegment> {
    let end = segments.partition_point(|s| s.start_ns <= t_ns);
    segments[..end].iter().rev().find(|s| s.is_active_at(t_ns))
}

/// Collapse runs of whitespace so caption text wraps predictably.
pub fn normalize_caption_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Vec<CaptionSegment> {
        vec![
            CaptionSegment::new(0, 1_000, "first"),
            CaptionSegment::new(1_000, 2_000, "second"),
            CaptionSegment::new(1_500, 1_800, "overlap"),
            CaptionSegment::new(5_000, 6_000, "late"),
        ]
    }

    #[test]
    fn test_boundaries_are_half_open() {
        let segs = segments();
        assert_eq!(active_caption(&segs, 0).map(|s| s.text.as_str()), Some("first"));
        assert_eq!(active_caption(&segs, 1_000).map(|s| s.text.as_str()), Some("second"));
        assert!(active_caption(&segs, 3_000).is_none());
        assert!(active_caption(&segs, 6_000).is_none());
    }

    #[test]
    fn test_overlap_prefers_latest_start() {
        let segs = segments();
        assert_eq!(active_caption(&segs, 1_600).map(|s| s.text.as_str()), Some("overlap"));
        assert_eq!(active_caption(&segs, 1_900).map(|s| s.text.as_str()), Some("second"));
    }

    #[test]
    fn test_empty_log() {
        assert!(active_caption(&[], 0).is_none());
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_caption_text("  hello \n  world "), "hello world");
    }
}
