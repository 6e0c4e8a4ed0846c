//! midir-backed device session.
//!
//! Output carries cell colors, NRPNs and note-offs. The input port with the
//! same name is opened alongside, and raw bytes from it are forwarded to an
//! unbounded channel for the module's event loop.

use linnlight_core::{DeviceError, DeviceSession};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;

/// MIDI session with a LinnStrument (or anything speaking its protocol).
pub struct MidirSession {
    client_name: String,
    output: Option<MidiOutputConnection>,
    input: Option<MidiInputConnection<mpsc::UnboundedSender<Vec<u8>>>>,
    inbound: mpsc::UnboundedSender<Vec<u8>>,
    port_name: Option<String>,
}

impl MidirSession {
    /// Create a disconnected session. Inbound device messages will be sent
    /// to `inbound`.
    pub fn new(client_name: &str, inbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            client_name: client_name.to_string(),
            output: None,
            input: None,
            inbound,
            port_name: None,
        }
    }

    /// Name of the connected output port.
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.output.is_some()
    }

    pub fn disconnect(&mut self) {
        if let Some(input) = self.input.take() {
            input.close();
        }
        self.output = None;
        self.port_name = None;
    }

    fn connect_input(&mut self, output_name: &str) -> Result<(), DeviceError> {
        let midi_in = MidiInput::new(&format!("{}_in", self.client_name))
            .map_err(|e| DeviceError::Connect(e.to_string()))?;

        let in_port = midi_in
            .ports()
            .into_iter()
            .find(|p| {
                midi_in
                    .port_name(p)
                    .map(|n| n.contains(output_name) || output_name.contains(&n))
                    .unwrap_or(false)
            })
            .ok_or_else(|| DeviceError::PortNotFound(output_name.to_string()))?;

        let connection = midi_in
            .connect(
                &in_port,
                "linnlight-device-input",
                move |_timestamp, message, tx| {
                    // Send raw MIDI bytes to async handler
                    let _ = tx.send(message.to_vec());
                },
                self.inbound.clone(),
            )
            .map_err(|e| DeviceError::Connect(e.to_string()))?;

        self.input = Some(connection);
        Ok(())
    }
}

impl DeviceSession for MidirSession {
    fn port_names(&self) -> Vec<String> {
        match MidiOutput::new(&format!("{}_scan", self.client_name)) {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect(),
            Err(e) => {
                tracing::warn!("Could not enumerate MIDI outputs: {}", e);
                Vec::new()
            }
        }
    }

    fn connect(&mut self, index: usize) -> Result<(), DeviceError> {
        self.disconnect();

        let midi_out = MidiOutput::new(&format!("{}_out", self.client_name))
            .map_err(|e| DeviceError::Connect(e.to_string()))?;
        let ports = midi_out.ports();
        let port = ports.get(index).ok_or(DeviceError::InvalidPort(index))?;
        let name = midi_out
            .port_name(port)
            .map_err(|e| DeviceError::Connect(e.to_string()))?;

        let connection = midi_out
            .connect(port, "linnlight-device-output")
            .map_err(|e| DeviceError::Connect(e.to_string()))?;
        self.output = Some(connection);
        tracing::info!("Device output connected: {}", name);

        // Octave reports arrive on the input; lighting works without it
        match self.connect_input(&name) {
            Ok(()) => tracing::info!("Device input connected: {}", name),
            Err(e) => {
                tracing::warn!("Device input unavailable, octave tracking disabled: {}", e)
            }
        }

        self.port_name = Some(name);
        Ok(())
    }

    fn send(&mut self, message: &[u8]) -> Result<(), DeviceError> {
        let output = self.output.as_mut().ok_or(DeviceError::NotConnected)?;
        output
            .send(message)
            .map_err(|e| DeviceError::Send(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_connection() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = MidirSession::new("linnlight_test", tx);

        assert!(!session.is_connected());
        assert!(matches!(
            session.send_control_change(0, 22, 1),
            Err(DeviceError::NotConnected)
        ));
        assert!(matches!(
            session.send_nrpn(299, 36),
            Err(DeviceError::NotConnected)
        ));
    }
}
