//! Per-pitch note age tracking.
//!
//! Every MIDI pitch owns a [`PitchTimer`]. A timer is either sounding, or
//! anchored at its note-off time and decaying through a few color stages
//! before falling back to the static scale color. Ticks are cheap and emit a
//! [`Repaint`] only when what is shown on the grid has to change.

use super::color::ColorClass;
use super::modulation::ModulationSnapshot;

pub const NUM_PITCHES: usize = 128;

/// Voices tracked for modulation (one per MIDI channel).
pub const NUM_VOICES: usize = 16;

/// Wall-clock time in milliseconds.
pub type Millis = f64;

/// What a timer's age is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TriggerAnchor {
    /// Never triggered.
    #[default]
    Never,
    /// Note is held.
    Sounding,
    /// Note was released at this time.
    Released(Millis),
}

/// Visual stage of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayStage {
    Sounding,
    JustReleased,
    Fading,
    Dimming,
    Idle,
}

impl DecayStage {
    /// Stage of `anchor` at `now` for a decay of `decay_ms`.
    pub fn at(anchor: TriggerAnchor, now: Millis, decay_ms: f32) -> Self {
        let released_at = match anchor {
            TriggerAnchor::Never => return DecayStage::Idle,
            TriggerAnchor::Sounding => return DecayStage::Sounding,
            TriggerAnchor::Released(at) => at,
        };

        let age = now - released_at;
        let decay_ms = decay_ms as f64;
        if age < 0.0 {
            DecayStage::Sounding
        } else if age < decay_ms * 0.25 {
            DecayStage::JustReleased
        } else if age < decay_ms * 0.5 {
            DecayStage::Fading
        } else if age < decay_ms {
            DecayStage::Dimming
        } else {
            DecayStage::Idle
        }
    }

    /// Dynamic color, or `None` when the cell shows its static color.
    pub fn color(self) -> Option<ColorClass> {
        match self {
            DecayStage::Sounding => Some(ColorClass::Red),
            DecayStage::JustReleased => Some(ColorClass::Pink),
            DecayStage::Fading => Some(ColorClass::Cyan),
            DecayStage::Dimming => Some(ColorClass::Blue),
            DecayStage::Idle => None,
        }
    }
}

/// A change to push to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repaint {
    /// Pitch whose cells must first be restored to their static color.
    pub erase: Option<i32>,
    /// Pitch to paint.
    pub pitch: i32,
    pub stage: DecayStage,
}

/// State kept for one MIDI pitch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchTimer {
    pub anchor: TriggerAnchor,
    /// Voice that last played this pitch.
    pub voice: Option<usize>,
    /// Stage last painted, `None` before the first paint.
    pub last_stage: Option<DecayStage>,
    /// Pitch last painted, which differs from the timer's own pitch under bend.
    pub last_output_pitch: Option<i32>,
}

impl PitchTimer {
    /// Evaluate the timer for `pitch` at `now`.
    ///
    /// Returns the updated timer and the repaint needed to show it, if any.
    pub fn step(
        self,
        pitch: u8,
        now: Millis,
        decay_ms: f32,
        bend: i32,
    ) -> (PitchTimer, Option<Repaint>) {
        let stage = DecayStage::at(self.anchor, now, decay_ms);
        let output_pitch = (pitch as i32).saturating_add(bend);

        if self.last_stage == Some(stage) && self.last_output_pitch == Some(output_pitch) {
            return (self, None);
        }

        let erase = self
            .last_output_pitch
            .filter(|&previous| previous != output_pitch);
        let next = PitchTimer {
            last_stage: Some(stage),
            last_output_pitch: Some(output_pitch),
            ..self
        };
        (
            next,
            Some(Repaint {
                erase,
                pitch: output_pitch,
                stage,
            }),
        )
    }
}

/// The 128 pitch timers plus per-voice modulation.
#[derive(Debug)]
pub struct NoteAgeTracker {
    timers: [PitchTimer; NUM_PITCHES],
    modulation: [ModulationSnapshot; NUM_VOICES],
}

impl NoteAgeTracker {
    pub fn new() -> Self {
        Self {
            timers: [PitchTimer::default(); NUM_PITCHES],
            modulation: std::array::from_fn(|_| ModulationSnapshot::default()),
        }
    }

    /// Record a note event.
    ///
    /// Velocity 0 is a note-off and starts the decay at `time`. Returns the
    /// accepted pitch index, or `None` if `pitch` is not a MIDI pitch.
    pub fn trigger(
        &mut self,
        pitch: i32,
        velocity: u8,
        voice: Option<usize>,
        modulation: ModulationSnapshot,
        time: Millis,
    ) -> Option<u8> {
        let voice = voice.filter(|&v| v < NUM_VOICES);
        if let Some(v) = voice {
            self.modulation[v] = modulation;
        }

        let index = u8::try_from(pitch).ok().filter(|&p| (p as usize) < NUM_PITCHES)?;
        let timer = &mut self.timers[index as usize];
        if velocity > 0 {
            timer.anchor = TriggerAnchor::Sounding;
            timer.voice = voice;
        } else {
            timer.anchor = TriggerAnchor::Released(time);
        }
        Some(index)
    }

    /// Advance one pitch's timer, returning a repaint if the grid must change.
    pub fn step(&mut self, pitch: u8, now: Millis, decay_ms: f32) -> Option<Repaint> {
        let index = pitch as usize;
        if index >= NUM_PITCHES {
            return None;
        }

        let timer = self.timers[index];
        let bend = timer
            .voice
            .map(|v| self.modulation[v].bend_offset())
            .unwrap_or(0);
        let (next, repaint) = timer.step(pitch, now, decay_ms, bend);
        self.timers[index] = next;
        repaint
    }

    /// Forget the painted stage of every timer currently showing a dynamic
    /// color, so the next tick paints it again over a full repaint.
    pub fn invalidate_lit(&mut self) {
        for timer in &mut self.timers {
            if matches!(timer.last_stage, Some(stage) if stage != DecayStage::Idle) {
                timer.last_stage = None;
            }
        }
    }

    pub fn timer(&self, pitch: u8) -> Option<&PitchTimer> {
        self.timers.get(pitch as usize)
    }
}

impl Default for NoteAgeTracker {
    fn default() -> Self {
        Self::new()
    }
}
