//! Outbound side of the device connection.

use thiserror::Error;

use super::nrpn;

/// Errors reported by a [`DeviceSession`].
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),

    #[error("MIDI port index {0} out of range")]
    InvalidPort(usize),

    #[error("Failed to connect MIDI port: {0}")]
    Connect(String),

    #[error("Failed to send MIDI: {0}")]
    Send(String),

    #[error("MIDI output not connected")]
    NotConnected,
}

/// A MIDI connection to the grid device.
///
/// Implementors only need to move raw bytes; the higher level messages are
/// provided on top of [`DeviceSession::send`]. Channels are zero-based.
pub trait DeviceSession {
    /// Names of the output ports that can be selected by index.
    fn port_names(&self) -> Vec<String>;

    /// Connect to the port at `index`, dropping any previous connection.
    fn connect(&mut self, index: usize) -> Result<(), DeviceError>;

    /// Send one raw MIDI message.
    fn send(&mut self, message: &[u8]) -> Result<(), DeviceError>;

    fn send_control_change(
        &mut self,
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Result<(), DeviceError> {
        self.send(&[0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F])
    }

    /// Note-on with velocity 0.
    fn send_note_off(&mut self, pitch: u8, channel: u8) -> Result<(), DeviceError> {
        self.send(&[0x90 | (channel & 0x0F), pitch & 0x7F, 0])
    }

    /// Send the six-message NRPN sequence for `param`/`value`.
    fn send_nrpn(&mut self, param: u16, value: u16) -> Result<(), DeviceError> {
        for message in nrpn::encode(param, value) {
            self.send(&message)?;
        }
        Ok(())
    }
}

/// In-memory session that records everything sent to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    pub ports: Vec<String>,
    pub connected: Option<usize>,
    pub sent: Vec<Vec<u8>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports(ports: &[&str]) -> Self {
        Self {
            ports: ports.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Drain the recorded messages.
    pub fn take(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }

    /// Cells painted through the CC 20/21/22 addressing, as
    /// `(column, row, palette index)` with the grid column (not the device
    /// column).
    pub fn painted_cells(&self) -> Vec<(u8, u8, u8)> {
        let mut row = 0;
        let mut column = 0;
        let mut cells = Vec::new();
        for message in &self.sent {
            if message.len() != 3
                || message[0] & 0xF0 != 0xB0
                || message[0] == nrpn::NRPN_CHANNEL_HEADER
            {
                continue;
            }
            match message[1] {
                20 => column = message[2],
                21 => row = message[2],
                22 => cells.push((column.saturating_sub(1), row, message[2])),
                _ => {}
            }
        }
        cells
    }
}

impl DeviceSession for RecordingSession {
    fn port_names(&self) -> Vec<String> {
        self.ports.clone()
    }

    fn connect(&mut self, index: usize) -> Result<(), DeviceError> {
        if index >= self.ports.len() {
            return Err(DeviceError::InvalidPort(index));
        }
        self.connected = Some(index);
        Ok(())
    }

    fn send(&mut self, message: &[u8]) -> Result<(), DeviceError> {
        self.sent.push(message.to_vec());
        Ok(())
    }
}
