//! Export job runner: replays a frozen copy of the deck through one [`crate::encode::FrameSink`].

pub mod job;
pub mod progress;

pub use job::{CancelToken, ExportJob, ExportOptions, ExportReport, Exporter};
pub use progress::{JobState, LogObserver, ProgressObserver, RecordingObserver};
