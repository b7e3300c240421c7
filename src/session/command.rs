use std::path::PathBuf;

use crate::foundation::core::DocumentSize;
use crate::selection::controller::Direction;

/// Semantic editor commands, independent of key or pointer bindings.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Collapse any range and move the current slide by one.
    Move(Direction),
    /// Grow or shrink the range by moving its far end.
    Extend(Direction),
    Click { index: usize, extend: bool },
    AddSlide,
    /// Delete the current slide. Refused below two slides.
    Delete,
    Duplicate,
    Copy,
    Paste,
    /// Export a snapshot to the given path.
    Save(PathBuf),
    /// Import a dropped or opened snapshot file.
    Open(PathBuf),
    DragStart(usize),
    Drop(usize),
    CancelDrag,
    Resize(DocumentSize),
    SetBackground(String),
}

impl Command {
    /// Whether the command may change which slide is current.
    pub(crate) fn moves_current(&self) -> bool {
        !matches!(
            self,
            Command::Copy
                | Command::Save(_)
                | Command::DragStart(_)
                | Command::CancelDrag
                | Command::Resize(_)
                | Command::SetBackground(_)
        )
    }
}
