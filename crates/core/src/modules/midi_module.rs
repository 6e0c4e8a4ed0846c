use std::collections::HashMap;

use async_trait::async_trait;
use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use tokio::sync::mpsc;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage, ModuleResult};
use crate::midi::midi::MidiMessage;

/// Host-side MIDI input.
///
/// Listens on the first input port whose name contains `port_name` and
/// forwards every channel voice message it understands to the module
/// manager. A missing port is reported but not fatal, so the grid keeps
/// showing the scale.
pub struct MidiModule {
    port_name: String,
    connection: Option<MidiInputConnection<mpsc::Sender<ModuleMessage>>>,
    status: HashMap<String, String>,
}

impl MidiModule {
    pub fn new(port_name: String) -> Self {
        Self {
            port_name,
            connection: None,
            status: HashMap::new(),
        }
    }

    /// Names of all MIDI input ports on the system.
    pub fn input_port_names() -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let midi_in = MidiInput::new("linnlight_port_scan")?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    fn find_port(midi_in: &MidiInput, name: &str) -> Option<(MidiInputPort, String)> {
        midi_in.ports().into_iter().find_map(|port| {
            let port_name = midi_in.port_name(&port).ok()?;
            port_name.contains(name).then_some((port, port_name))
        })
    }

    fn connect(
        &mut self,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let midi_in = MidiInput::new("linnlight_host_input")?;
        let (port, full_name) = Self::find_port(&midi_in, &self.port_name)
            .ok_or_else(|| format!("no MIDI input matching '{}'", self.port_name))?;

        let connection = midi_in
            .connect(
                &port,
                "linnlight-host-input",
                |_timestamp, bytes, tx| {
                    let Some(message) = MidiMessage::parse(bytes) else {
                        return;
                    };
                    // Called on the driver's thread; never block it
                    let event = ModuleEvent::MidiInput(message);
                    if let Err(e) = tx.try_send(ModuleMessage::Event(event)) {
                        log::warn!("Dropped host MIDI message: {}", e);
                    }
                },
                tx,
            )
            .map_err(|e| format!("failed to open '{}': {}", full_name, e))?;

        self.connection = Some(connection);
        Ok(full_name)
    }
}

#[async_trait]
impl AsyncModule for MidiModule {
    fn id(&self) -> ModuleId {
        ModuleId::Midi
    }

    async fn initialize(&mut self) -> ModuleResult {
        log::info!("Host MIDI input will listen on '{}'", self.port_name);
        self.status
            .insert("port".to_string(), self.port_name.clone());
        self.status
            .insert("connected".to_string(), "false".to_string());
        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> ModuleResult {
        let report = match self.connect(tx.clone()) {
            Ok(full_name) => {
                self.status
                    .insert("connected".to_string(), "true".to_string());
                ModuleMessage::Status(format!("Host MIDI input '{}' connected", full_name))
            }
            Err(e) => ModuleMessage::Error(format!("Host MIDI input unavailable: {}", e)),
        };
        let _ = tx.send(report).await;

        // Messages flow from the callback; this task only waits to stop
        while let Some(event) = rx.recv().await {
            if let ModuleEvent::Shutdown = event {
                break;
            }
        }

        Ok(())
    }

    async fn shutdown(&mut self) -> ModuleResult {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.status
            .insert("connected".to_string(), "false".to_string());

        log::info!("Host MIDI input closed");
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_disconnected() {
        let mut module = MidiModule::new("Keystation".to_string());
        module.initialize().await.unwrap();

        let status = module.status();
        assert_eq!(status.get("port").map(String::as_str), Some("Keystation"));
        assert_eq!(status.get("connected").map(String::as_str), Some("false"));
        assert_eq!(module.id(), ModuleId::Midi);
    }
}
