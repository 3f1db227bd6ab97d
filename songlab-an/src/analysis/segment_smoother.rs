//! Short-segment smoothing
//!
//! Single left-to-right pass: a segment shorter than the minimum duration is
//! absorbed by extending the previous kept segment instead of being emitted.
//!
//! Labels that end up adjacent and equal after absorption are not merged
//! again. The first segment is always kept as-is, so it is the only output
//! segment that may be shorter than the minimum.

use crate::models::ChordSegment;

/// Default minimum chord duration in seconds
pub const DEFAULT_MIN_DURATION: f64 = 0.5;

/// Absorb segments shorter than `min_duration` into their predecessor
///
/// Input must be sorted by `start_time`. Idempotent.
pub fn smooth_segments(segments: Vec<ChordSegment>, min_duration: f64) -> Vec<ChordSegment> {
    let mut iter = segments.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for segment in iter {
        if segment.duration() < min_duration {
            current.end_time = current.end_time.max(segment.end_time);
        } else {
            merged.push(std::mem::replace(&mut current, segment));
        }
    }
    merged.push(current);
    merged
}

/// Bring externally supplied segments into canonical form
///
/// Drops segments with non-finite times or `end_time <= start_time`, sorts
/// by start, trims each start to the previous end where they overlap, and
/// merges touching segments that share a label. The output is sorted,
/// non-overlapping, and has no two touching segments with the same label.
pub fn normalize_segments(segments: Vec<ChordSegment>) -> Vec<ChordSegment> {
    let mut valid: Vec<ChordSegment> = segments
        .into_iter()
        .filter(|s| s.start_time.is_finite() && s.end_time.is_finite())
        .filter(|s| s.end_time > s.start_time)
        .collect();
    valid.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.end_time.total_cmp(&b.end_time))
    });

    let mut out: Vec<ChordSegment> = Vec::with_capacity(valid.len());
    for mut segment in valid {
        if let Some(prev) = out.last_mut() {
            if segment.start_time < prev.end_time {
                segment.start_time = prev.end_time;
            }
            if segment.end_time <= segment.start_time {
                continue;
            }
            if segment.chord_name == prev.chord_name && segment.start_time <= prev.end_time {
                prev.end_time = segment.end_time;
                continue;
            }
        }
        out.push(segment);
    }
    out
}
