//! Canonical document data: the ordered slide collection, document size, background, attachment
//! store and filename, plus the mutation API every other component goes through.

pub mod element;
pub mod files;
pub mod model;
pub mod slide;
