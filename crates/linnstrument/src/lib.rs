//! LinnStrument integration for linnlight.
//!
//! This crate connects the lighting controller in `linnlight-core` to a
//! real device:
//! - midir-backed device session (cell colors and NRPNs out, octave
//!   reports and played notes in)
//! - async module that ticks the controller and routes device input
//!
//! # Cell Addressing
//!
//! The playing surface is 25x8 cells. Column 0 of the device is its control
//! column, so grid column `x` is addressed as device column `x + 1`:
//!
//! ```text
//! CC21 = row (0-7)
//! CC20 = column (1-25)
//! CC22 = color (palette index)
//! ```

pub mod midi;
pub mod module;

pub use midi::MidirSession;
pub use module::LinnstrumentModule;
