use serde::{Deserialize, Serialize};

use crate::lighting::controller::{DeviceConfig, DEFAULT_DECAY_MS, DEVICE_NAME};
use crate::lighting::geometry::DEFAULT_OCTAVE;
use crate::lighting::{Millis, ModulationSnapshot, Scale, ScaleKind};

/// Commands sent from the host to the lighting module
#[derive(Debug, Clone)]
pub enum LightingCommand {
    /// A note event from a synth voice (velocity 0 = note off)
    Trigger {
        pitch: i32,
        velocity: u8,
        voice: Option<usize>,
        modulation: ModulationSnapshot,
        time: Millis,
    },
    SetBlackout(bool),
    SetDecayMs(f32),
    SelectDevice(usize),
    SetSendScaleLights(bool),
    /// The shared scale was modified
    ScaleChanged,
    RestoreState {
        device_index: Option<usize>,
        decay_ms: f32,
        blackout: bool,
    },
}

/// Settings configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    // Device settings
    pub device_name: String,
    pub device_index: Option<usize>,
    pub poll_interval_ms: u64,
    pub octave_query_interval_ms: u64,
    pub send_scale_lights: bool,

    // Lighting settings
    pub decay_ms: f32,
    pub blackout: bool,
    pub octave: i32,

    // Scale settings
    pub scale_root: u8,
    pub scale_kind: ScaleKind,

    // Host input settings
    pub input_port: Option<String>,
    pub bend_range_semitones: f32,
}

impl Settings {
    /// Lighting configuration described by these settings.
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            device_index: self.device_index,
            decay_ms: self.decay_ms,
            blackout: self.blackout,
            octave: self.octave,
            send_scale_lights: self.send_scale_lights,
        }
    }

    /// Copy back the state the controller learned while running.
    pub fn update_from(&mut self, config: &DeviceConfig) {
        self.device_index = config.device_index;
        self.decay_ms = config.decay_ms;
        self.blackout = config.blackout;
        self.octave = config.octave;
        self.send_scale_lights = config.send_scale_lights;
    }

    pub fn scale(&self) -> Scale {
        Scale::new(self.scale_root, self.scale_kind)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Device defaults
            device_name: DEVICE_NAME.to_string(),
            device_index: None,
            poll_interval_ms: 20,
            octave_query_interval_ms: 2000,
            send_scale_lights: false,

            // Lighting defaults
            decay_ms: DEFAULT_DECAY_MS,
            blackout: false,
            octave: DEFAULT_OCTAVE,

            // Scale defaults
            scale_root: 0,
            scale_kind: ScaleKind::Major,

            // Host input defaults
            input_port: None,
            bend_range_semitones: 2.0,
        }
    }
}
