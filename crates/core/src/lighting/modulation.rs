//! Per-voice modulation captured at trigger time.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Largest bend offset applied to a pitch, either way.
pub const MAX_BEND_SEMITONES: i32 = 127;

/// A live pitch-bend value, sampled on every tick.
pub trait PitchBendSource: Send + Sync {
    /// Current bend in semitones.
    fn semitones(&self) -> f32;
}

/// Modulation in effect for a voice when it was last triggered.
#[derive(Clone, Default)]
pub struct ModulationSnapshot {
    pub pitch_bend: Option<Arc<dyn PitchBendSource>>,
}

impl ModulationSnapshot {
    pub fn with_pitch_bend(source: Arc<dyn PitchBendSource>) -> Self {
        Self {
            pitch_bend: Some(source),
        }
    }

    /// Bend rounded to the nearest semitone, 0 without a source.
    pub fn bend_offset(&self) -> i32 {
        self.pitch_bend
            .as_ref()
            .map(|source| {
                (source.semitones().round() as i32).clamp(-MAX_BEND_SEMITONES, MAX_BEND_SEMITONES)
            })
            .unwrap_or(0)
    }
}

impl fmt::Debug for ModulationSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModulationSnapshot")
            .field(
                "pitch_bend",
                &self.pitch_bend.as_ref().map(|source| source.semitones()),
            )
            .finish()
    }
}

/// Pitch bend shared between a MIDI input callback and the tracker.
///
/// The value is stored as `f32` bits so writers never block the reader.
#[derive(Debug, Clone, Default)]
pub struct BendSource {
    bits: Arc<AtomicU32>,
}

impl BendSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_semitones(&self, semitones: f32) {
        self.bits.store(semitones.to_bits(), Ordering::Relaxed);
    }

    /// Set from a raw 14-bit MIDI pitch-bend value (8192 = center).
    pub fn set_from_midi(&self, raw: u16, range_semitones: f32) {
        let normalized = (raw.min(0x3FFF) as f32 - 8192.0) / 8192.0;
        self.set_semitones(normalized * range_semitones);
    }
}

impl PitchBendSource for BendSource {
    fn semitones(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bend_offset_rounds() {
        let bend = BendSource::new();
        let snapshot = ModulationSnapshot::with_pitch_bend(Arc::new(bend.clone()));

        assert_eq!(snapshot.bend_offset(), 0);
        bend.set_semitones(1.6);
        assert_eq!(snapshot.bend_offset(), 2);
        bend.set_semitones(-0.4);
        assert_eq!(snapshot.bend_offset(), 0);
        bend.set_semitones(-1.5);
        assert_eq!(snapshot.bend_offset(), -2);
    }

    #[test]
    fn test_bend_offset_is_bounded() {
        let bend = BendSource::new();
        let snapshot = ModulationSnapshot::with_pitch_bend(Arc::new(bend.clone()));

        bend.set_semitones(f32::INFINITY);
        assert_eq!(snapshot.bend_offset(), MAX_BEND_SEMITONES);
        bend.set_semitones(-1.0e12);
        assert_eq!(snapshot.bend_offset(), -MAX_BEND_SEMITONES);
    }

    #[test]
    fn test_bend_from_midi() {
        let bend = BendSource::new();
        bend.set_from_midi(8192, 2.0);
        assert_eq!(bend.semitones(), 0.0);
        bend.set_from_midi(0, 2.0);
        assert_eq!(bend.semitones(), -2.0);
        bend.set_from_midi(0x3FFF, 12.0);
        assert!(bend.semitones() > 11.9);
    }

    #[test]
    fn test_no_source_means_no_offset() {
        assert_eq!(ModulationSnapshot::default().bend_offset(), 0);
    }
}
