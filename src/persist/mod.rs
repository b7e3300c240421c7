//! Portable snapshots of the document plus font registry.

pub mod remote;
pub mod snapshot;

pub use remote::{RemoteFile, RemoteSnippet, SnippetSource, load_remote};
pub use snapshot::{SNAPSHOT_EXTENSION, Snapshot, is_snapshot_path};
