pub mod config;
pub mod core;
pub mod metrics;
pub mod opener;
pub mod server;

// Re-export commonly used types
pub use config::{ApiSettings, CacheSettings, ServerConfig};
pub use core::{
    ArrayHandle, CacheKey, CacheStoreStats, CachedDatasetReader, DatasetCacheStore, DatasetHandle,
    DatasetOpener, TilerError,
};
pub use metrics::init_metrics;
pub use opener::FileSystemOpener;
pub use server::{AppState, create_router};
