//! Mapping between playing-surface cells and MIDI pitches.
//!
//! Rows are a fourth (5 semitones) apart, so one pitch usually appears in
//! several cells. Reverse lookups scan the whole surface.

/// Playable columns (the device's control column is not part of the grid).
pub const GRID_COLUMNS: u8 = 25;

pub const GRID_ROWS: u8 = 8;

/// Octave the device reports until told otherwise.
pub const DEFAULT_OCTAVE: i32 = 5;

/// Octaves the device can be set to.
pub const MIN_OCTAVE: i32 = 0;
pub const MAX_OCTAVE: i32 = 10;

/// Pitch of cell (0, 0) at [`DEFAULT_OCTAVE`].
const BASE_PITCH: i32 = 30;

/// Semitones between vertically adjacent cells.
const ROW_INTERVAL: i32 = 5;

/// Pitch played by cell `(x, y)` with the device at `octave`.
pub fn grid_to_pitch(x: u8, y: u8, octave: i32) -> i32 {
    BASE_PITCH + x as i32 + y as i32 * ROW_INTERVAL + (octave - DEFAULT_OCTAVE) * 12
}

/// Every cell on the surface, row by row.
pub fn all_cells() -> impl Iterator<Item = (u8, u8)> {
    (0..GRID_ROWS).flat_map(|y| (0..GRID_COLUMNS).map(move |x| (x, y)))
}

/// All cells that currently play `pitch`.
pub fn cells_for_pitch(pitch: i32, octave: i32) -> impl Iterator<Item = (u8, u8)> {
    all_cells().filter(move |&(x, y)| grid_to_pitch(x, y, octave) == pitch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_pitch() {
        assert_eq!(grid_to_pitch(0, 0, 5), 30);
        assert_eq!(grid_to_pitch(24, 7, 5), 30 + 24 + 35);
        assert_eq!(grid_to_pitch(0, 0, 4), 18);
        assert_eq!(grid_to_pitch(0, 0, 7), 54);
    }

    #[test]
    fn test_reverse_lookup_contains_every_cell() {
        for octave in [3, 5, 8] {
            for (x, y) in all_cells() {
                let pitch = grid_to_pitch(x, y, octave);
                assert!(
                    cells_for_pitch(pitch, octave).any(|cell| cell == (x, y)),
                    "cell ({}, {}) missing for pitch {}",
                    x,
                    y,
                    pitch
                );
            }
        }
    }

    #[test]
    fn test_overlapping_cells() {
        // (5, 0) and (0, 1) are the same note
        let cells: Vec<_> = cells_for_pitch(35, 5).collect();
        assert_eq!(cells, vec![(5, 0), (0, 1)]);
    }

    #[test]
    fn test_pitch_off_the_surface() {
        assert_eq!(cells_for_pitch(29, 5).count(), 0);
        assert_eq!(cells_for_pitch(200, 5).count(), 0);
    }

    #[test]
    fn test_all_cells_count() {
        assert_eq!(all_cells().count(), 200);
    }
}
