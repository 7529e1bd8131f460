use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic class of a point after post-processing.
///
/// `Noise` does not exist in the upstream labeller's output; it is synthesized
/// by this stage for points rejected while building the terrain model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassLabel {
    Noise,
    Terrain,
    Vegetation,
    Cwd,
    Stem,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 5] = [
        ClassLabel::Noise,
        ClassLabel::Terrain,
        ClassLabel::Vegetation,
        ClassLabel::Cwd,
        ClassLabel::Stem,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ClassLabel::Noise => "noise",
            ClassLabel::Terrain => "terrain",
            ClassLabel::Vegetation => "vegetation",
            ClassLabel::Cwd => "cwd",
            ClassLabel::Stem => "stem",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a persisted label integer came from.
///
/// Upstream files were written before the noise class existed, so their codes
/// sit one below the stage's own encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    Upstream,
    Processed,
}

/// Offset between upstream label codes and processed label codes.
pub const UPSTREAM_LABEL_OFFSET: i32 = 1;

/// Integer encoding of [`ClassLabel`] used in persisted files.
///
/// Only the parsers and exporters deal with raw codes; everything in between
/// works with [`ClassLabel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelScheme {
    pub noise: i32,
    pub terrain: i32,
    pub vegetation: i32,
    pub cwd: i32,
    pub stem: i32,
}

impl Default for LabelScheme {
    fn default() -> Self {
        Self {
            noise: 0,
            terrain: 1,
            vegetation: 2,
            cwd: 3,
            stem: 4,
        }
    }
}

impl LabelScheme {
    pub fn encode(&self, label: ClassLabel) -> i32 {
        match label {
            ClassLabel::Noise => self.noise,
            ClassLabel::Terrain => self.terrain,
            ClassLabel::Vegetation => self.vegetation,
            ClassLabel::Cwd => self.cwd,
            ClassLabel::Stem => self.stem,
        }
    }

    pub fn decode(&self, code: i32) -> Option<ClassLabel> {
        ClassLabel::ALL
            .into_iter()
            .find(|label| self.encode(*label) == code)
    }

    pub fn decode_from(&self, code: i32, source: LabelSource) -> Option<ClassLabel> {
        match source {
            LabelSource::Upstream => code
                .checked_add(UPSTREAM_LABEL_OFFSET)
                .and_then(|code| self.decode(code)),
            LabelSource::Processed => self.decode(code),
        }
    }

    /// Returns the first pair of classes sharing a code, if any.
    pub fn find_collision(&self) -> Option<(ClassLabel, ClassLabel)> {
        for (i, a) in ClassLabel::ALL.iter().enumerate() {
            for b in &ClassLabel::ALL[i + 1..] {
                if self.encode(*a) == self.encode(*b) {
                    return Some((*a, *b));
                }
            }
        }
        None
    }
}
