pub use config::{ConfigError, ConfigManager, ConfigSchema};
pub use lighting::{
    BendSource, ColorClass, DeviceConfig, DeviceError, DeviceSession, GridLighting, HostClock,
    Millis, ModulationSnapshot, NrpnDecoder, NrpnMessage, RecordingSession, Scale, ScaleKind,
    ScaleOracle, SharedScale,
};
pub use messages::{LightingCommand, Settings};
pub use midi::midi::MidiMessage;
// Async module system exports
pub use modules::{
    AsyncModule, MidiModule, ModuleError, ModuleEvent, ModuleId, ModuleManager, ModuleMessage,
    ModuleResult,
};

mod config;
pub mod lighting;
pub mod messages;
mod midi;
mod modules;
