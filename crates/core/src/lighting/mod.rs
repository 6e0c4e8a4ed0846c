//! Grid lighting for LinnStrument-style controllers.
//!
//! - [`geometry`]: cell <-> pitch mapping
//! - [`color`]: palette and static scale colors
//! - [`note_age`]: per-pitch decay timers
//! - [`nrpn`]: NRPN encode/decode
//! - [`controller`]: the [`GridLighting`] controller tying them to a device

pub mod clock;
pub mod color;
pub mod controller;
pub mod geometry;
pub mod modulation;
pub mod note_age;
pub mod nrpn;
pub mod scale;
pub mod session;

pub use clock::HostClock;
pub use color::{resolve_static_color, ColorClass};
pub use controller::{DeviceConfig, GridLighting};
pub use geometry::{cells_for_pitch, grid_to_pitch};
pub use modulation::{BendSource, ModulationSnapshot, PitchBendSource};
pub use note_age::{DecayStage, Millis, NoteAgeTracker, PitchTimer, Repaint};
pub use nrpn::{NrpnDecoder, NrpnMessage};
pub use scale::{Scale, ScaleKind, ScaleOracle, SharedScale};
pub use session::{DeviceError, DeviceSession, RecordingSession};
