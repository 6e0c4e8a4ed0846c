use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::messages::LightingCommand;
use crate::midi::midi::MidiMessage;

/// Unique identifier for each module type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleId {
    /// Host-side MIDI input (keyboard or synth feeding notes)
    Midi,
    /// The grid device lighting module
    Lighting,
}

/// Events that can be sent between modules
#[derive(Debug, Clone)]
pub enum ModuleEvent {
    /// MIDI input events from the host input port
    MidiInput(MidiMessage),
    /// Lighting command for the device module
    Lighting(LightingCommand),
    /// Lighting state the device module wants persisted
    LightingStateChanged(crate::lighting::DeviceConfig),
    /// System events
    Shutdown,
}

/// Messages a module reports back to whoever drains the manager's queue
#[derive(Debug)]
pub enum ModuleMessage {
    Event(ModuleEvent),
    /// Human-readable progress, logged at info
    Status(String),
    /// A failure the module survived or stopped on
    Error(String),
}

/// Error type returned by module lifecycle methods
pub type ModuleResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A unit of work the [`ModuleManager`](super::ModuleManager) runs on its
/// own task.
///
/// Lifecycle: `initialize` once before any task starts, then `run` until it
/// receives [`ModuleEvent::Shutdown`] (or its queue closes), then
/// `shutdown` on the same task.
#[async_trait]
pub trait AsyncModule: Send + Sync {
    fn id(&self) -> ModuleId;

    async fn initialize(&mut self) -> ModuleResult;

    /// Main loop. `rx` delivers events routed to this module, `tx` reaches
    /// the host.
    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> ModuleResult;

    async fn shutdown(&mut self) -> ModuleResult;

    /// Free-form key/value status for diagnostics
    fn status(&self) -> HashMap<String, String>;
}
