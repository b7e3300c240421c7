//! Encoders consuming the ordered frame sequence of an export job.

pub mod animate;
pub mod ffmpeg;
pub mod gif;
pub mod pdf;
pub mod sink;
pub mod stills;

pub use sink::{FrameSink, InMemorySink, SinkConfig};
