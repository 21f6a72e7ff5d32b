//! Shared utilities: artifact persistence.

pub mod persist;

pub use persist::{ArtifactStore, DirectoryStore, WriteOutcome};
