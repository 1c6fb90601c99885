pub mod dataset;
pub mod error;
pub mod key;
pub mod reader;
pub mod snapshot;
pub mod store;

pub use dataset::{ArrayHandle, ChunkRef, CoordValue, DatasetHandle, Dimension};
pub use error::{Result, TilerError};
pub use key::CacheKey;
pub use reader::{CachedDatasetReader, DatasetOpener};
pub use snapshot::SnapshotError;
pub use store::{CacheStoreStats, DatasetCacheStore};
