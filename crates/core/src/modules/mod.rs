pub mod midi_module;
pub mod module_manager;
pub mod traits;

// Re-export for convenience
pub use midi_module::MidiModule;
pub use module_manager::{ModuleError, ModuleManager};
pub use traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage, ModuleResult};
