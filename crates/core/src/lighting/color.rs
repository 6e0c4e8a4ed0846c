//! Cell colors and the scale-based static color policy.

use super::scale::ScaleOracle;

/// LinnStrument cell color palette indices (CC22 values).
///
/// Index 0 means "use the color configured on the device" and is never sent
/// by this crate.
pub mod palette {
    pub const RED: u8 = 1;
    pub const YELLOW: u8 = 2;
    pub const GREEN: u8 = 3;
    pub const CYAN: u8 = 4;
    pub const BLUE: u8 = 5;
    pub const BLACK: u8 = 7;
    pub const ORANGE: u8 = 9;
    pub const PINK: u8 = 11;
}

/// Color class of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorClass {
    Black,
    Red,
    Pink,
    Cyan,
    Blue,
    Green,
    Orange,
    Yellow,
}

impl ColorClass {
    /// Palette index the device expects on CC22.
    pub const fn palette_index(self) -> u8 {
        match self {
            ColorClass::Black => palette::BLACK,
            ColorClass::Red => palette::RED,
            ColorClass::Pink => palette::PINK,
            ColorClass::Cyan => palette::CYAN,
            ColorClass::Blue => palette::BLUE,
            ColorClass::Green => palette::GREEN,
            ColorClass::Orange => palette::ORANGE,
            ColorClass::Yellow => palette::YELLOW,
        }
    }
}

impl Default for ColorClass {
    fn default() -> Self {
        ColorClass::Black
    }
}

/// Static (idle) color of a pitch.
///
/// Blackout wins over everything. Otherwise root, pentatonic and scale
/// membership are checked in that order.
pub fn resolve_static_color<S: ScaleOracle + ?Sized>(
    scale: &S,
    pitch: i32,
    blackout: bool,
) -> ColorClass {
    if blackout {
        return ColorClass::Black;
    }

    if scale.is_root(pitch) {
        ColorClass::Green
    } else if scale.is_in_pentatonic(pitch) {
        ColorClass::Orange
    } else if scale.is_in_scale(pitch) {
        ColorClass::Yellow
    } else {
        ColorClass::Black
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::scale::{Scale, ScaleKind};

    #[test]
    fn test_static_color_priority() {
        // C major
        let scale = Scale::new(0, ScaleKind::Major);

        assert_eq!(resolve_static_color(&scale, 60, false), ColorClass::Green);
        assert_eq!(resolve_static_color(&scale, 62, false), ColorClass::Orange);
        // F is in C major but not in its pentatonic subset
        assert_eq!(resolve_static_color(&scale, 65, false), ColorClass::Yellow);
        assert_eq!(resolve_static_color(&scale, 61, false), ColorClass::Black);
    }

    #[test]
    fn test_blackout_overrides_root() {
        let scale = Scale::new(0, ScaleKind::Major);
        assert_eq!(resolve_static_color(&scale, 60, true), ColorClass::Black);
    }

    #[test]
    fn test_palette_indices_are_distinct() {
        let all = [
            ColorClass::Black,
            ColorClass::Red,
            ColorClass::Pink,
            ColorClass::Cyan,
            ColorClass::Blue,
            ColorClass::Green,
            ColorClass::Orange,
            ColorClass::Yellow,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.palette_index(), b.palette_index());
            }
        }
    }
}
