//! Filesystem implementations of the pipeline seams.
//!
//! - [`FilesystemResourceProvider`]: product images and artwork from a directory
//! - [`FilesystemObjectStorage`]: a bucket mapped onto a directory tree
//!
//! The in-memory variants live in `cartel-traits` and are re-exported here.

mod filesystem;
mod storage;

pub use filesystem::FilesystemResourceProvider;
pub use storage::FilesystemObjectStorage;

pub use cartel_traits::{InMemoryObjectStorage, InMemoryResourceProvider};
