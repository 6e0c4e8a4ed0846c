//! Scale membership queries.
//!
//! The lighting controller does not own musical scale state. It is handed a
//! [`ScaleOracle`] and is told about changes through
//! `GridLighting::on_scale_changed`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Answers scale membership questions for absolute MIDI pitches.
pub trait ScaleOracle {
    /// Tones per octave (12 for standard tuning).
    fn tet(&self) -> u32;

    fn is_root(&self, pitch: i32) -> bool;

    fn is_in_pentatonic(&self, pitch: i32) -> bool;

    fn is_in_scale(&self, pitch: i32) -> bool;
}

/// Scale shapes understood by [`Scale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    Major,
    Minor,
    Dorian,
    Mixolydian,
    Chromatic,
}

impl ScaleKind {
    pub const ALL: [ScaleKind; 5] = [
        Self::Major,
        Self::Minor,
        Self::Dorian,
        Self::Mixolydian,
        Self::Chromatic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Dorian => "dorian",
            Self::Mixolydian => "mixolydian",
            Self::Chromatic => "chromatic",
        }
    }

    /// Semitone intervals from the root (root = 0).
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    /// Pentatonic subset of [`Self::intervals`].
    pub fn pentatonic(self) -> &'static [u8] {
        match self {
            // degrees 1 2 3 5 6
            Self::Major | Self::Mixolydian => &[0, 2, 4, 7, 9],
            // degrees 1 3 4 5 7
            Self::Minor | Self::Dorian => &[0, 3, 5, 7, 10],
            Self::Chromatic => &[],
        }
    }
}

impl fmt::Display for ScaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScaleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == lower)
            .ok_or_else(|| format!("unknown scale '{}'", s))
    }
}

/// A 12-tet scale anchored on a root pitch class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    /// Root pitch class, 0 = C .. 11 = B
    pub root: u8,
    pub kind: ScaleKind,
}

impl Scale {
    pub fn new(root: u8, kind: ScaleKind) -> Self {
        Self {
            root: root % 12,
            kind,
        }
    }

    fn degree(&self, pitch: i32) -> u8 {
        (pitch - self.root as i32).rem_euclid(12) as u8
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::new(0, ScaleKind::Major)
    }
}

impl ScaleOracle for Scale {
    fn tet(&self) -> u32 {
        12
    }

    fn is_root(&self, pitch: i32) -> bool {
        self.degree(pitch) == 0
    }

    fn is_in_pentatonic(&self, pitch: i32) -> bool {
        self.kind.pentatonic().contains(&self.degree(pitch))
    }

    fn is_in_scale(&self, pitch: i32) -> bool {
        self.kind.intervals().contains(&self.degree(pitch))
    }
}

/// Scale handle shared between its owner and the lighting controller.
pub type SharedScale = Arc<RwLock<Scale>>;

impl<T: ScaleOracle + ?Sized> ScaleOracle for Arc<T> {
    fn tet(&self) -> u32 {
        (**self).tet()
    }

    fn is_root(&self, pitch: i32) -> bool {
        (**self).is_root(pitch)
    }

    fn is_in_pentatonic(&self, pitch: i32) -> bool {
        (**self).is_in_pentatonic(pitch)
    }

    fn is_in_scale(&self, pitch: i32) -> bool {
        (**self).is_in_scale(pitch)
    }
}

impl<T: ScaleOracle> ScaleOracle for RwLock<T> {
    fn tet(&self) -> u32 {
        self.read().tet()
    }

    fn is_root(&self, pitch: i32) -> bool {
        self.read().is_root(pitch)
    }

    fn is_in_pentatonic(&self, pitch: i32) -> bool {
        self.read().is_in_pentatonic(pitch)
    }

    fn is_in_scale(&self, pitch: i32) -> bool {
        self.read().is_in_scale(pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_membership() {
        let scale = Scale::new(0, ScaleKind::Major);
        assert!(scale.is_root(48));
        assert!(scale.is_in_scale(64));
        assert!(!scale.is_in_scale(66));
        assert!(scale.is_in_pentatonic(69));
        assert!(!scale.is_in_pentatonic(71));
    }

    #[test]
    fn test_negative_pitch_wraps() {
        let scale = Scale::new(0, ScaleKind::Major);
        assert!(scale.is_root(-12));
        assert!(scale.is_in_scale(-1)); // B
    }

    #[test]
    fn test_shared_scale_sees_updates() {
        let shared: SharedScale = Arc::new(RwLock::new(Scale::new(0, ScaleKind::Major)));
        assert!(shared.is_root(60));

        *shared.write() = Scale::new(2, ScaleKind::Minor);
        assert!(!shared.is_root(60));
        assert!(shared.is_root(62));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Dorian".parse::<ScaleKind>(), Ok(ScaleKind::Dorian));
        assert!("lydian".parse::<ScaleKind>().is_err());
    }
}
