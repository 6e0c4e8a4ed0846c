//! NRPN framing over control-change messages.
//!
//! ```text
//! 1011nnnn  99  0vvvvvvv   parameter MSB
//! 1011nnnn  98  0vvvvvvv   parameter LSB
//! 1011nnnn   6  0vvvvvvv   value MSB
//! 1011nnnn  38  0vvvvvvv   value LSB
//! 1011nnnn 101  127        RPN reset MSB
//! 1011nnnn 100  127        RPN reset LSB
//! ```

/// Status byte every outgoing NRPN message is sent with.
pub const NRPN_CHANNEL_HEADER: u8 = 177;

/// Largest 14-bit parameter number or value.
pub const MAX_14BIT: u16 = 0x3FFF;

/// Controller numbers involved in NRPN framing.
pub mod cc {
    pub const DATA_ENTRY_MSB: u8 = 6;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const NRPN_LSB: u8 = 98;
    pub const NRPN_MSB: u8 = 99;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;

    /// RPN "null" value terminating a sequence.
    pub const RPN_NULL: u8 = 127;
}

/// A complete parameter/value pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NrpnMessage {
    pub param: u16,
    pub value: u16,
}

impl NrpnMessage {
    pub fn new(param: u16, value: u16) -> Self {
        Self { param, value }
    }
}

/// Encode `param`/`value` as the six raw messages of an NRPN sequence.
///
/// Both numbers are truncated to 14 bits. MSB always precedes LSB.
pub fn encode(param: u16, value: u16) -> [[u8; 3]; 6] {
    let param = param & MAX_14BIT;
    let value = value & MAX_14BIT;
    [
        [NRPN_CHANNEL_HEADER, cc::NRPN_MSB, (param >> 7) as u8],
        [NRPN_CHANNEL_HEADER, cc::NRPN_LSB, (param & 0x7F) as u8],
        [NRPN_CHANNEL_HEADER, cc::DATA_ENTRY_MSB, (value >> 7) as u8],
        [NRPN_CHANNEL_HEADER, cc::DATA_ENTRY_LSB, (value & 0x7F) as u8],
        [NRPN_CHANNEL_HEADER, cc::RPN_MSB, cc::RPN_NULL],
        [NRPN_CHANNEL_HEADER, cc::RPN_LSB, cc::RPN_NULL],
    ]
}

/// Reassembles NRPN pairs from a stream of control changes.
///
/// Each byte is remembered independently and overwritten whenever its
/// controller arrives again; nothing enforces ordering. A pair is produced
/// only when the value LSB (CC 38) arrives and every byte has been seen at
/// least once. Parameter bytes are accepted on both the NRPN (99/98) and
/// RPN (101/100) controllers, except the RPN null that closes a sequence,
/// which never replaces a parameter byte.
#[derive(Debug, Clone, Default)]
pub struct NrpnDecoder {
    param_msb: Option<u8>,
    param_lsb: Option<u8>,
    value_msb: Option<u8>,
    value_lsb: Option<u8>,
}

impl NrpnDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one control change. Returns a pair when CC 38 completes one.
    pub fn feed(&mut self, controller: u8, value: u8) -> Option<NrpnMessage> {
        let value = value & 0x7F;
        match controller {
            cc::RPN_MSB | cc::RPN_LSB if value == cc::RPN_NULL => {}
            cc::NRPN_MSB | cc::RPN_MSB => self.param_msb = Some(value),
            cc::NRPN_LSB | cc::RPN_LSB => self.param_lsb = Some(value),
            cc::DATA_ENTRY_MSB => self.value_msb = Some(value),
            cc::DATA_ENTRY_LSB => {
                self.value_lsb = Some(value);
                return self.current();
            }
            _ => {}
        }
        None
    }

    /// The pair formed by the bytes currently held, if all four are known.
    pub fn current(&self) -> Option<NrpnMessage> {
        let param = (self.param_msb? as u16) << 7 | self.param_lsb? as u16;
        let value = (self.value_msb? as u16) << 7 | self.value_lsb? as u16;
        Some(NrpnMessage::new(param, value))
    }
}
