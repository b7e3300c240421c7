//! One-way canonical ownership between the document and the interactive drawing surface.
//!
//! The document owns slide content. The synchronizer pushes canonical elements into the surface
//! on slide switch and resize, and pulls the surface's elements back only on explicit triggers
//! (selection change, completed pointer gesture, attachment binding).

pub mod probe;
pub mod surface;
pub mod synchronizer;
