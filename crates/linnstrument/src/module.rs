//! LinnstrumentModule - Async module driving the LinnStrument grid lights.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use linnlight_core::lighting::Millis;
use linnlight_core::{
    AsyncModule, DeviceConfig, DeviceSession, GridLighting, HostClock, LightingCommand,
    ModuleEvent, ModuleId, ModuleMessage, ModuleResult, Settings, SharedScale,
};
use tokio::sync::mpsc;

use crate::midi::{DeviceInput, MidirSession};

/// LinnStrument lighting module.
///
/// Owns the lighting controller, so every trigger, tick and inbound device
/// message is handled on this module's task:
/// - host note events arrive as [`LightingCommand`]s
/// - inbound device MIDI is forwarded from the session's input callback
/// - a poll interval advances the decay timers and the octave handshake
pub struct LinnstrumentModule<D = MidirSession> {
    /// Lighting controller and its device session
    lighting: GridLighting<SharedScale, D>,

    /// Clock the host timestamps triggers with
    clock: HostClock,

    /// Port name substring the device is looked up by
    device_name: String,

    /// Tick period
    poll_interval: Duration,

    /// Raw device MIDI receiver (from callback)
    device_rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,

    /// Last configuration reported to the host
    reported: DeviceConfig,

    /// Module status
    status: HashMap<String, String>,
}

impl LinnstrumentModule<MidirSession> {
    /// Create a module talking to a real device over midir.
    pub fn new(settings: &Settings, scale: SharedScale, clock: HostClock) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = MidirSession::new("linnlight", tx);
        Self::with_session(settings, scale, clock, session, Some(rx))
    }
}

impl<D: DeviceSession + Send + Sync + 'static> LinnstrumentModule<D> {
    /// Create a module over any device session. `device_rx` carries raw
    /// messages received from the device.
    pub fn with_session(
        settings: &Settings,
        scale: SharedScale,
        clock: HostClock,
        session: D,
        device_rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    ) -> Self {
        let config = settings.device_config();
        let lighting = GridLighting::new(scale, session, config.clone())
            .with_octave_query_interval(settings.octave_query_interval_ms as Millis);

        Self {
            lighting,
            clock,
            device_name: settings.device_name.clone(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            device_rx,
            reported: config,
            status: HashMap::new(),
        }
    }

    pub fn lighting(&self) -> &GridLighting<SharedScale, D> {
        &self.lighting
    }

    /// Reconnect the saved port if it still carries the device name,
    /// otherwise search for the device by name.
    fn connect_device(&mut self) {
        let ports = self.lighting.session().port_names();
        let saved = self.lighting.config().device_index.filter(|&index| {
            ports
                .get(index)
                .map_or(false, |port| port.contains(&self.device_name))
        });

        let connected = match saved {
            Some(index) => {
                self.lighting.select_device(index);
                Some(index)
            }
            None => self.lighting.init(&self.device_name),
        };

        match connected {
            Some(index) => {
                let name = ports.get(index).cloned().unwrap_or_default();
                tracing::info!("LinnStrument lighting on port {}: {}", index, name);
                self.status.insert("device".to_string(), name);
            }
            None => {
                self.status
                    .insert("device".to_string(), "not_found".to_string());
                tracing::warn!(
                    "No MIDI output matching '{}' - waiting for device selection",
                    self.device_name
                );
            }
        }
    }

    /// Handle a raw message received from the device.
    fn handle_device_message(&mut self, message: &[u8]) {
        match DeviceInput::translate(message) {
            Some(DeviceInput::ControlChange { controller, value }) => {
                self.lighting.on_device_control_change(controller, value);
            }
            Some(DeviceInput::Note { pitch, channel }) => {
                self.lighting.on_device_note(pitch, channel);
            }
            None => {}
        }
    }

    /// Apply a host command to the lighting controller.
    fn handle_command(&mut self, command: LightingCommand) {
        match command {
            LightingCommand::Trigger {
                pitch,
                velocity,
                voice,
                modulation,
                time,
            } => {
                self.lighting.trigger(pitch, velocity, voice, modulation, time);
            }
            LightingCommand::SetBlackout(blackout) => self.lighting.set_blackout(blackout),
            LightingCommand::SetDecayMs(decay_ms) => self.lighting.set_decay_ms(decay_ms),
            LightingCommand::SelectDevice(index) => {
                self.lighting.select_device(index);
                self.status
                    .insert("device".to_string(), format!("port {}", index));
            }
            LightingCommand::SetSendScaleLights(enabled) => {
                self.lighting.set_send_scale_lights(enabled)
            }
            LightingCommand::ScaleChanged => self.lighting.on_scale_changed(),
            LightingCommand::RestoreState {
                device_index,
                decay_ms,
                blackout,
            } => {
                self.lighting.restore_state(device_index, decay_ms, blackout);
            }
        }
    }

    /// Configuration to report to the host, if it changed since last time.
    fn take_config_change(&mut self) -> Option<DeviceConfig> {
        if *self.lighting.config() == self.reported {
            return None;
        }
        self.reported = self.lighting.config().clone();
        Some(self.reported.clone())
    }

    fn report_config(&mut self, tx: &mpsc::Sender<ModuleMessage>) {
        if let Some(config) = self.take_config_change() {
            self.status
                .insert("octave".to_string(), config.octave.to_string());
            let event = ModuleEvent::LightingStateChanged(config);
            if let Err(e) = tx.try_send(ModuleMessage::Event(event)) {
                tracing::debug!("Failed to report lighting state (channel full): {}", e);
            }
        }
    }
}

#[async_trait]
impl<D: DeviceSession + Send + Sync + 'static> AsyncModule for LinnstrumentModule<D> {
    fn id(&self) -> ModuleId {
        ModuleId::Lighting
    }

    async fn initialize(&mut self) -> ModuleResult {
        tracing::info!("Initializing LinnStrument module");

        // A missing device is not fatal; the host may select one later
        self.connect_device();

        self.status
            .insert("state".to_string(), "initialized".to_string());
        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> ModuleResult {
        tracing::info!("LinnStrument module running");
        self.status
            .insert("state".to_string(), "running".to_string());

        let mut poll_interval = tokio::time::interval(self.poll_interval);
        poll_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Take ownership of device receiver
        let mut device_rx = self.device_rx.take();

        loop {
            tokio::select! {
                // Handle module events
                event = rx.recv() => {
                    match event {
                        Some(ModuleEvent::Lighting(command)) => self.handle_command(command),
                        Some(ModuleEvent::Shutdown) | None => {
                            tracing::info!("LinnStrument module received shutdown");
                            break;
                        }
                        Some(_) => {}
                    }
                }

                // Handle device input
                Some(message) = async {
                    if let Some(ref mut rx) = device_rx {
                        rx.recv().await
                    } else {
                        std::future::pending().await
                    }
                } => {
                    self.handle_device_message(&message);
                }

                // Advance decay timers and device handshakes
                _ = poll_interval.tick() => {
                    self.lighting.tick(self.clock.now_ms());
                }
            }

            self.report_config(&tx);
        }

        Ok(())
    }

    async fn shutdown(&mut self) -> ModuleResult {
        tracing::info!("Shutting down LinnStrument module");

        // Leave the grid showing the scale rather than stale note colors
        self.lighting.repaint_all();

        self.status
            .insert("state".to_string(), "shutdown".to_string());
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}
