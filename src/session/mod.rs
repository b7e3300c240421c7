//! Editor context: explicitly wired services plus the semantic command surface.

pub mod command;
pub mod editor;

pub use command::Command;
pub use editor::Editor;
