//! Lyric line / chord segment alignment

use crate::models::{ChordSegment, LyricLine, MergedLyricChordLine, NO_CHORD};

/// Label each lyric line with the chord sounding at its start
///
/// Both inputs must be sorted by start time. The chord cursor only moves
/// forward, past every segment ending at or before the line start; a
/// half-open segment never contains its own end, so a line starting on a
/// chord change takes the next chord. Output has one entry per lyric line,
/// in input order.
pub fn align_lyrics(lines: &[LyricLine], chords: &[ChordSegment]) -> Vec<MergedLyricChordLine> {
    let mut cursor = 0usize;

    lines
        .iter()
        .map(|line| {
            while cursor < chords.len() && chords[cursor].end_time <= line.start {
                cursor += 1;
            }

            let chord_name = match chords.get(cursor) {
                Some(chord) if chord.contains(line.start) => chord.chord_name.clone(),
                _ => NO_CHORD.to_string(),
            };

            MergedLyricChordLine {
                start: line.start,
                end: line.end,
                text: line.text.clone(),
                chord_name,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(start: f64, text: &str) -> LyricLine {
        LyricLine {
            start,
            end: start + 1.0,
            text: text.to_string(),
        }
    }

    fn labels(merged: &[MergedLyricChordLine]) -> Vec<&str> {
        merged.iter().map(|m| m.chord_name.as_str()).collect()
    }

    #[test]
    fn test_lines_take_chord_at_start() {
        let chords = vec![
            ChordSegment::new(0.0, 2.0, "C"),
            ChordSegment::new(2.0, 4.0, "G"),
            ChordSegment::new(4.0, 6.0, "Am"),
        ];
        let lines = vec![line(0.5, "one"), line(2.0, "two"), line(5.9, "three")];

        let merged = align_lyrics(&lines, &chords);

        assert_eq!(labels(&merged), vec!["C", "G", "Am"]);
        assert_eq!(merged[1].text, "two");
    }

    #[test]
    fn test_gaps_and_overrun_get_no_chord() {
        let chords = vec![ChordSegment::new(1.0, 2.0, "C"), ChordSegment::new(3.0, 4.0, "F")];
        let lines = vec![line(0.0, "before"), line(2.5, "gap"), line(10.0, "after")];

        let merged = align_lyrics(&lines, &chords);

        assert_eq!(labels(&merged), vec![NO_CHORD, NO_CHORD, NO_CHORD]);
    }

    #[test]
    fn test_no_chords_labels_everything_n() {
        let lines = vec![line(0.0, "a"), line(1.0, "b")];
        let merged = align_lyrics(&lines, &[]);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|m| m.chord_name == NO_CHORD));
    }

    #[test]
    fn test_count_and_order_preserved() {
        let chords = vec![ChordSegment::new(0.0, 100.0, "E")];
        let lines: Vec<LyricLine> = (0..20).map(|i| line(i as f64 * 3.0, &format!("l{i}"))).collect();

        let merged = align_lyrics(&lines, &chords);

        assert_eq!(merged.len(), lines.len());
        for (m, l) in merged.iter().zip(lines.iter()) {
            assert_eq!(m.text, l.text);
            assert_eq!(m.start, l.start);
            assert_eq!(m.chord_name, "E");
        }
    }

    #[test]
    fn test_line_on_chord_change_takes_next_chord() {
        let chords = vec![ChordSegment::new(0.0, 2.0, "C"), ChordSegment::new(2.0, 4.0, "G")];
        let lines = vec![line(2.0, "on the change"), line(4.0, "at the end")];

        let merged = align_lyrics(&lines, &chords);

        assert_eq!(labels(&merged), vec!["G", NO_CHORD]);
    }

    #[test]
    fn test_line_at_segment_end_boundary() {
        // 2.0 ends C and falls in the gap before G
        let chords = vec![ChordSegment::new(0.0, 2.0, "C"), ChordSegment::new(2.5, 4.0, "G")];
        let merged = align_lyrics(&[line(2.0, "edge")], &chords);
        assert_eq!(labels(&merged), vec![NO_CHORD]);
    }
}
