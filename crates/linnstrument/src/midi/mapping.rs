//! LinnStrument inbound MIDI mapping.
//!
//! The device only reports two things the lighting controller cares about:
//!
//! ```text
//! Control change (any channel): NRPN fragments (CC 99/98/6/38, 101/100)
//!                               carrying octave reports
//! Note on / note off:           a pad played on the device itself, which
//!                               gets answered with a note-off so the device
//!                               does not light it on its own
//! ```

use linnlight_core::MidiMessage;

/// Device input the lighting module reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceInput {
    ControlChange { controller: u8, value: u8 },
    Note { pitch: u8, channel: u8 },
}

impl DeviceInput {
    /// Translate raw bytes received from the device.
    pub fn translate(message: &[u8]) -> Option<Self> {
        match MidiMessage::parse(message)? {
            MidiMessage::ControlChange {
                controller, value, ..
            } => Some(DeviceInput::ControlChange { controller, value }),
            MidiMessage::NoteOn { channel, note, .. }
            | MidiMessage::NoteOff { channel, note } => Some(DeviceInput::Note {
                pitch: note,
                channel,
            }),
            MidiMessage::PitchBend { .. } => None,
        }
    }
}
