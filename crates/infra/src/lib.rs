//! Infrastructure layer: directory-service adapters, snapshot assembly, the
//! background loader and its configuration.

pub mod assemble;
pub mod config;
pub mod directory;
pub mod loader;

pub use assemble::assemble;
pub use config::{LoaderConfig, MIN_REFRESH_INTERVAL};
pub use directory::{DirectoryError, DirectorySource, HttpDirectory, InMemoryDirectory};
pub use loader::{AttemptError, LoadError, RefreshHandle, RefreshOutcome, SnapshotLoader};
