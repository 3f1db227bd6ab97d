//! Krumhansl-Schmuckler key estimation
//!
//! The aggregate chroma profile is correlated (Pearson) against all 24
//! rotations of the major and minor key profiles. Candidates are visited
//! root-ascending, major before minor; the first maximum wins.

use super::chord_templates::{Chroma, SEMITONES};
use crate::models::{KeyEstimate, KeyMode};

/// Krumhansl-Kessler major profile, tonic at index 0
pub const MAJOR_PROFILE: [f64; SEMITONES] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor profile, tonic at index 0
pub const MINOR_PROFILE: [f64; SEMITONES] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Rotate right by `shift` so the tonic lands on pitch class `shift`
fn rotate(profile: &[f64; SEMITONES], shift: usize) -> [f64; SEMITONES] {
    let mut out = [0.0; SEMITONES];
    for (i, value) in profile.iter().enumerate() {
        out[(i + shift) % SEMITONES] = *value;
    }
    out
}

/// Pearson correlation; zero-variance inputs correlate 0
pub fn pearson(a: &[f64; SEMITONES], b: &[f64; SEMITONES]) -> f64 {
    let n = SEMITONES as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        0.0
    } else {
        cov / denom
    }
}

/// Sum chroma frames into one 12-bin profile
pub fn aggregate_chroma(frames: &[Chroma]) -> [f64; SEMITONES] {
    let mut profile = [0.0f64; SEMITONES];
    for frame in frames {
        for (acc, x) in profile.iter_mut().zip(frame.iter()) {
            *acc += *x as f64;
        }
    }
    profile
}

/// Key of a profile with tonal content
///
/// `None` when the profile is flat (silence, no frames) or not finite, since
/// every correlation is then undefined.
pub fn detect_key(profile: &[f64; SEMITONES]) -> Option<KeyEstimate> {
    if profile.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let max = profile.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = profile.iter().cloned().fold(f64::INFINITY, f64::min);
    if max - min <= f64::EPSILON {
        return None;
    }
    Some(estimate_key(profile))
}

/// Best-matching key for an aggregate profile
pub fn estimate_key(profile: &[f64; SEMITONES]) -> KeyEstimate {
    estimate_key_with_score(profile).0
}

/// Best-matching key and its correlation
pub fn estimate_key_with_score(profile: &[f64; SEMITONES]) -> (KeyEstimate, f64) {
    let mut best = KeyEstimate {
        root: 0,
        mode: KeyMode::Major,
    };
    let mut best_score = f64::NEG_INFINITY;

    for root in 0..SEMITONES {
        for (mode, template) in [(KeyMode::Major, &MAJOR_PROFILE), (KeyMode::Minor, &MINOR_PROFILE)] {
            let score = pearson(profile, &rotate(template, root));
            if score > best_score {
                best_score = score;
                best = KeyEstimate {
                    root: root as u8,
                    mode,
                };
            }
        }
    }

    (best, best_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_profile_itself_is_c_major() {
        let key = estimate_key(&MAJOR_PROFILE);
        assert_eq!(key.to_string(), "C major");
    }

    #[test]
    fn test_rotated_minor_profile_is_detected() {
        // A minor
        let profile = rotate(&MINOR_PROFILE, 9);
        let (key, score) = estimate_key_with_score(&profile);
        assert_eq!(key.to_string(), "A minor");
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_every_rotation_is_recovered() {
        for root in 0..12 {
            let key = estimate_key(&rotate(&MAJOR_PROFILE, root));
            assert_eq!(key.root as usize, root);
            assert_eq!(key.mode, KeyMode::Major);
        }
    }

    #[test]
    fn test_detect_key_rejects_flat_and_non_finite() {
        assert_eq!(detect_key(&[0.0; 12]), None);
        assert_eq!(detect_key(&[3.0; 12]), None);
        let mut broken = MAJOR_PROFILE;
        broken[4] = f64::NAN;
        assert_eq!(detect_key(&broken), None);
        assert_eq!(
            detect_key(&rotate(&MAJOR_PROFILE, 7)).map(|k| k.to_string()),
            Some("G major".to_string())
        );
    }

    #[test]
    fn test_flat_profile_falls_back_to_c_major() {
        let key = estimate_key(&[1.0; 12]);
        assert_eq!(key, KeyEstimate { root: 0, mode: KeyMode::Major });
        let key = estimate_key(&[0.0; 12]);
        assert_eq!(key.to_string(), "C major");
    }

    #[test]
    fn test_rotate_matches_roll_semantics() {
        let rolled = rotate(&MAJOR_PROFILE, 1);
        assert_eq!(rolled[1], MAJOR_PROFILE[0]);
        assert_eq!(rolled[0], MAJOR_PROFILE[11]);
    }

    #[test]
    fn test_aggregate_sums_frames() {
        let mut a = [0.0f32; 12];
        a[0] = 1.0;
        let mut b = [0.0f32; 12];
        b[0] = 0.5;
        b[7] = 2.0;
        let profile = aggregate_chroma(&[a, b]);
        assert_eq!(profile[0], 1.5);
        assert_eq!(profile[7], 2.0);
        assert_eq!(profile[3], 0.0);
    }

    #[test]
    fn test_c_major_triad_chroma_prefers_c_major() {
        let mut frame = [0.0f32; 12];
        frame[0] = 1.0;
        frame[4] = 0.8;
        frame[7] = 0.9;
        let key = estimate_key(&aggregate_chroma(&[frame; 4]));
        assert_eq!(key.to_string(), "C major");
    }
}
