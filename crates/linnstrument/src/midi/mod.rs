//! LinnStrument MIDI handling.
//!
//! Device connection and inbound message routing.

mod mapping;
mod session;

pub use mapping::DeviceInput;
pub use session::MidirSession;
