pub mod merge;
pub mod resource;
pub mod storage;

pub use merge::{MergeError, MergeFunction, MergeRequest};
pub use resource::{InMemoryResourceProvider, ResourceError, ResourceProvider, SharedResourceData};
pub use storage::{InMemoryObjectStorage, ObjectStorage, SignedUrl, StorageError};
