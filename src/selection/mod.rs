//! Range selection over slide indices, drag/drop payloads and the slide clipboard.

pub mod clipboard;
pub mod controller;
