// MIDI message types we care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// 14-bit bend, 8192 = center
    PitchBend {
        channel: u8,
        value: u16,
    },
}

impl MidiMessage {
    /// Parse a raw channel voice message. Note-on with velocity 0 is a note-off.
    pub fn parse(message: &[u8]) -> Option<Self> {
        if message.len() < 3 {
            return None;
        }

        let channel = message[0] & 0x0F;
        let data1 = message[1] & 0x7F;
        let data2 = message[2] & 0x7F;
        match message[0] & 0xF0 {
            0x90 if data2 > 0 => Some(MidiMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            }),
            0x90 | 0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: data1,
            }),
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                controller: data1,
                value: data2,
            }),
            0xE0 => Some(MidiMessage::PitchBend {
                channel,
                value: (data2 as u16) << 7 | data1 as u16,
            }),
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => channel,
        }
    }
}
