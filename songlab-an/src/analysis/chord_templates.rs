//! Chord template bank
//!
//! 12 roots × 7 qualities = 84 L2-normalized pitch-class templates.

use crate::models::NOTE_NAMES;

pub const SEMITONES: usize = 12;

/// 12-bin pitch-class vector, index 0 = C
pub type Chroma = [f32; SEMITONES];

/// Supported chord qualities, in template order per root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    DominantSeventh,
    MajorSeventh,
    MinorSeventh,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 7] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::Diminished,
        ChordQuality::Augmented,
        ChordQuality::DominantSeventh,
        ChordQuality::MajorSeventh,
        ChordQuality::MinorSeventh,
    ];

    /// Semitone offsets from the root
    pub fn intervals(&self) -> &'static [usize] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Diminished => &[0, 3, 6],
            ChordQuality::Augmented => &[0, 4, 8],
            ChordQuality::DominantSeventh => &[0, 4, 7, 10],
            ChordQuality::MajorSeventh => &[0, 4, 7, 11],
            ChordQuality::MinorSeventh => &[0, 3, 7, 10],
        }
    }

    /// Suffix appended to the root name (`""` → "C", `"m7"` → "Cm7")
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::DominantSeventh => "7",
            ChordQuality::MajorSeventh => "maj7",
            ChordQuality::MinorSeventh => "m7",
        }
    }
}

/// One normalized template
#[derive(Debug, Clone, PartialEq)]
pub struct ChordTemplate {
    pub name: String,
    pub root: u8,
    pub quality: ChordQuality,
    pub vector: Chroma,
}

impl ChordTemplate {
    fn build(root: usize, quality: ChordQuality) -> Self {
        let mut vector = [0.0f32; SEMITONES];
        for offset in quality.intervals() {
            vector[(root + offset) % SEMITONES] = 1.0;
        }
        l2_normalize(&mut vector);

        Self {
            name: format!("{}{}", NOTE_NAMES[root], quality.suffix()),
            root: root as u8,
            quality,
            vector,
        }
    }
}

/// Static table of chord templates
#[derive(Debug, Clone)]
pub struct ChordTemplateBank {
    templates: Vec<ChordTemplate>,
}

impl ChordTemplateBank {
    /// Build all 84 templates, root-ascending then in [`ChordQuality::ALL`] order
    pub fn new() -> Self {
        let templates = (0..SEMITONES)
            .flat_map(|root| {
                ChordQuality::ALL
                    .iter()
                    .map(move |quality| ChordTemplate::build(root, *quality))
            })
            .collect();
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn templates(&self) -> &[ChordTemplate] {
        &self.templates
    }

    pub fn get(&self, name: &str) -> Option<&ChordTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Highest-scoring template for a normalized frame
    ///
    /// Scores are dot products, i.e. cosine similarity for unit vectors.
    /// On ties the earlier template wins.
    pub fn best_match(&self, frame: &Chroma) -> (&ChordTemplate, f32) {
        let mut best = &self.templates[0];
        let mut best_score = dot(frame, &best.vector);
        for template in &self.templates[1..] {
            let score = dot(frame, &template.vector);
            if score > best_score {
                best = template;
                best_score = score;
            }
        }
        (best, best_score)
    }
}

impl Default for ChordTemplateBank {
    fn default() -> Self {
        Self::new()
    }
}

pub fn dot(a: &Chroma, b: &Chroma) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale to unit length; all-zero vectors stay zero
pub fn l2_normalize(v: &mut Chroma) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
