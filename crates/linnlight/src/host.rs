//! Turns host MIDI input into lighting commands.

use std::sync::Arc;

use linnlight_core::lighting::note_age::NUM_VOICES;
use linnlight_core::{BendSource, HostClock, LightingCommand, MidiMessage, ModulationSnapshot};

/// One voice per MIDI channel, each with its own live pitch bend.
pub struct HostInput {
    clock: HostClock,
    bend_range_semitones: f32,
    bends: Vec<BendSource>,
}

impl HostInput {
    pub fn new(clock: HostClock, bend_range_semitones: f32) -> Self {
        Self {
            clock,
            bend_range_semitones,
            bends: (0..NUM_VOICES).map(|_| BendSource::new()).collect(),
        }
    }

    /// Note events become triggers; pitch bend updates the channel's bend
    /// source, which any note on that channel follows on the next tick.
    pub fn route(&self, message: MidiMessage) -> Option<LightingCommand> {
        match message {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => Some(self.trigger(channel, note, velocity)),
            MidiMessage::NoteOff { channel, note } => Some(self.trigger(channel, note, 0)),
            MidiMessage::PitchBend { channel, value } => {
                if let Some(bend) = self.bends.get(channel as usize) {
                    bend.set_from_midi(value, self.bend_range_semitones);
                }
                None
            }
            MidiMessage::ControlChange { .. } => None,
        }
    }

    fn trigger(&self, channel: u8, note: u8, velocity: u8) -> LightingCommand {
        let voice = channel as usize;
        let modulation = self
            .bends
            .get(voice)
            .map(|bend| ModulationSnapshot::with_pitch_bend(Arc::new(bend.clone())))
            .unwrap_or_default();

        LightingCommand::Trigger {
            pitch: note as i32,
            velocity,
            voice: Some(voice),
            modulation,
            time: self.clock.now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_become_triggers() {
        let input = HostInput::new(HostClock::new(), 2.0);

        match input.route(MidiMessage::NoteOn {
            channel: 3,
            note: 64,
            velocity: 90,
        }) {
            Some(LightingCommand::Trigger {
                pitch,
                velocity,
                voice,
                ..
            }) => {
                assert_eq!(pitch, 64);
                assert_eq!(velocity, 90);
                assert_eq!(voice, Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            input.route(MidiMessage::NoteOff {
                channel: 3,
                note: 64
            }),
            Some(LightingCommand::Trigger { velocity: 0, .. })
        ));
    }

    #[test]
    fn test_pitch_bend_follows_channel() {
        let input = HostInput::new(HostClock::new(), 2.0);

        let command = input.route(MidiMessage::NoteOn {
            channel: 1,
            note: 60,
            velocity: 100,
        });
        let Some(LightingCommand::Trigger { modulation, .. }) = command else {
            panic!("expected a trigger");
        };
        assert_eq!(modulation.bend_offset(), 0);

        // full upward bend on the same channel
        assert!(input
            .route(MidiMessage::PitchBend {
                channel: 1,
                value: 16383
            })
            .is_none());
        assert_eq!(modulation.bend_offset(), 2);

        // other channels are unaffected
        input.route(MidiMessage::PitchBend {
            channel: 2,
            value: 0,
        });
        assert_eq!(modulation.bend_offset(), 2);
    }
}
