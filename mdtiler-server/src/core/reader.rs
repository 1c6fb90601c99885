use super::dataset::{ArrayHandle, DatasetHandle};
use super::error::{Result, TilerError};
use super::key::CacheKey;
use super::snapshot;
use super::store::DatasetCacheStore;
use crate::config::CacheSettings;
use crate::metrics;
use std::sync::Arc;
use tracing::{debug, warn};

/// Authoritative dataset opener, supplied by the composition root
///
/// Treated as an opaque capability: it may block on network I/O and must be
/// idempotent for identical arguments within the TTL window.
pub trait DatasetOpener: Send + Sync {
    fn open(
        &self,
        location: &str,
        group: Option<&str>,
        decode_time_like: bool,
    ) -> Result<DatasetHandle>;
}

impl<F> DatasetOpener for F
where
    F: Fn(&str, Option<&str>, bool) -> Result<DatasetHandle> + Send + Sync,
{
    fn open(
        &self,
        location: &str,
        group: Option<&str>,
        decode_time_like: bool,
    ) -> Result<DatasetHandle> {
        self(location, group, decode_time_like)
    }
}

/// Read-through orchestration over the cache store
///
/// The only component that decides between reconstructing a handle from a
/// cached snapshot and opening from the authoritative source. Two concurrent
/// opens racing on a cold key may both hit the source and both write back;
/// last write wins and no single-flight de-duplication is attempted.
pub struct CachedDatasetReader {
    store: Arc<DatasetCacheStore>,
    opener: Arc<dyn DatasetOpener>,
    ttl: u64,
    disable: bool,
}

impl CachedDatasetReader {
    pub fn new(
        store: Arc<DatasetCacheStore>,
        opener: Arc<dyn DatasetOpener>,
        settings: &CacheSettings,
    ) -> Self {
        Self {
            store,
            opener,
            ttl: settings.ttl,
            disable: settings.disable,
        }
    }

    /// Open a dataset, reconstructing from cache when possible
    ///
    /// Every call yields a fresh owned handle; live handles are never shared
    /// between requests. Only opener failures surface to the caller - all
    /// cache faults fall through to the fresh-open path.
    pub async fn open(
        &self,
        location: &str,
        group: Option<&str>,
        decode_time_like: bool,
    ) -> Result<DatasetHandle> {
        let key = CacheKey::new(location, group, decode_time_like);

        if !self.disable {
            if let Some(payload) = self.store.get(&key) {
                match snapshot::decode(&payload) {
                    Ok(handle) => {
                        debug!("Reconstructed dataset from cache: {}", location);
                        metrics::DATASET_OPENS_TOTAL
                            .with_label_values(&["cache"])
                            .inc();
                        return Ok(handle);
                    }
                    Err(e) => {
                        // Incompatible or corrupt snapshot is a miss, not a failure
                        warn!("Discarding undecodable cache entry for {}: {}", key, e);
                    }
                }
            }
        }

        let handle = self.opener.open(location, group, decode_time_like)?;
        metrics::DATASET_OPENS_TOTAL
            .with_label_values(&["source"])
            .inc();
        debug!("Opened dataset from source: {}", location);

        if !self.disable {
            match snapshot::encode(&handle) {
                Ok(payload) => {
                    if !self.store.put(&key, &payload, "data", self.ttl) {
                        debug!("Cache write-back skipped for {}", key);
                    }
                }
                Err(e) => warn!("Failed to encode dataset snapshot for {}: {}", key, e),
            }
        }

        Ok(handle)
    }

    /// Extract a named array from an opened handle
    ///
    /// `datetime_filter` selects the matching slice along the handle's
    /// time-like dimension; `drop_dim` removes an unwanted dimension. Both
    /// fail with `DimensionNotFound` when the dimension is absent. Read-only
    /// with respect to the handle.
    pub fn select_variable(
        &self,
        handle: &DatasetHandle,
        name: &str,
        datetime_filter: Option<&str>,
        drop_dim: Option<&str>,
    ) -> Result<ArrayHandle> {
        let mut array = handle.get_variable(name)?.clone();

        if let Some(datetime) = datetime_filter {
            let time_dim = array
                .dims
                .iter()
                .find(|d| d.is_time_like())
                .map(|d| d.name.clone())
                .ok_or_else(|| TilerError::DimensionNotFound("time".to_string()))?;
            array = array.select_along_dimension(&time_dim, datetime)?;
        }

        if let Some(dim) = drop_dim {
            array = array.drop_dimension(dim)?;
        }

        Ok(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::{CoordValue, Dimension};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn sample_handle(location: &str) -> DatasetHandle {
        let mut variables = BTreeMap::new();
        variables.insert(
            "temperature".to_string(),
            ArrayHandle {
                name: "temperature".to_string(),
                dtype: "float32".to_string(),
                dims: vec![Dimension {
                    name: "time".to_string(),
                    values: vec![
                        CoordValue::Time("2020-01-01T00:00:00".to_string()),
                        CoordValue::Time("2020-01-02T00:00:00".to_string()),
                    ],
                }],
                attrs: BTreeMap::new(),
                chunks: vec![],
            },
        );
        DatasetHandle {
            location: location.to_string(),
            group: None,
            decode_time_like: false,
            attrs: BTreeMap::new(),
            variables,
        }
    }

    struct CountingOpener {
        calls: AtomicUsize,
    }

    impl DatasetOpener for CountingOpener {
        fn open(
            &self,
            location: &str,
            _group: Option<&str>,
            _decode_time_like: bool,
        ) -> Result<DatasetHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(sample_handle(location))
        }
    }

    fn reader_with(
        dir: &std::path::Path,
        opener: Arc<dyn DatasetOpener>,
        disable: bool,
    ) -> (CachedDatasetReader, Arc<DatasetCacheStore>) {
        let settings = CacheSettings {
            ttl: 300,
            max_size: 1024 * 1024,
            directory: Some(dir.to_path_buf()),
            disable,
        };
        let store = Arc::new(DatasetCacheStore::new(&settings));
        (
            CachedDatasetReader::new(store.clone(), opener, &settings),
            store,
        )
    }

    #[tokio::test]
    async fn test_cold_then_warm_open_calls_opener_once() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(CountingOpener {
            calls: AtomicUsize::new(0),
        });
        let (reader, store) = reader_with(dir.path(), opener.clone(), false);

        let first = reader
            .open("s3://bucket/data.zarr", None, false)
            .await
            .unwrap();
        assert_eq!(opener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().entries, 1);

        let second = reader
            .open("s3://bucket/data.zarr", None, false)
            .await
            .unwrap();
        assert_eq!(opener.calls.load(Ordering::SeqCst), 1, "second open is a hit");
        assert_eq!(first.list_variables(), second.list_variables());
    }

    struct FailingOpener;

    impl DatasetOpener for FailingOpener {
        fn open(
            &self,
            _location: &str,
            _group: Option<&str>,
            _decode_time_like: bool,
        ) -> Result<DatasetHandle> {
            Err(TilerError::SourceOpenFailed("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_opener_failure_propagates() {
        let dir = tempdir().unwrap();
        let (reader, _) = reader_with(dir.path(), Arc::new(FailingOpener), false);

        let err = reader.open("s3://bucket/gone.zarr", None, false).await;
        assert!(matches!(err, Err(TilerError::SourceOpenFailed(_))));
    }

    fn plain_opener(
        location: &str,
        _group: Option<&str>,
        _decode_time_like: bool,
    ) -> Result<DatasetHandle> {
        Ok(sample_handle(location))
    }

    #[tokio::test]
    async fn test_plain_function_works_as_opener() {
        let dir = tempdir().unwrap();
        let opener = plain_opener as fn(&str, Option<&str>, bool) -> Result<DatasetHandle>;
        let (reader, _) = reader_with(dir.path(), Arc::new(opener), false);

        let handle = reader.open("data.zarr", None, false).await.unwrap();
        assert_eq!(handle.list_variables(), vec!["temperature".to_string()]);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_opens_fresh() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(CountingOpener {
            calls: AtomicUsize::new(0),
        });
        let (reader, store) = reader_with(dir.path(), opener.clone(), true);

        reader.open("data.zarr", None, false).await.unwrap();
        reader.open("data.zarr", None, false).await.unwrap();

        assert_eq!(opener.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_select_variable_not_found() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(CountingOpener {
            calls: AtomicUsize::new(0),
        });
        let (reader, _) = reader_with(dir.path(), opener, false);

        let handle = reader.open("data.zarr", None, false).await.unwrap();
        let err = reader.select_variable(&handle, "salinity", None, None);
        assert!(matches!(err, Err(TilerError::VariableNotFound(_))));
    }

    #[tokio::test]
    async fn test_select_variable_with_datetime() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(CountingOpener {
            calls: AtomicUsize::new(0),
        });
        let (reader, _) = reader_with(dir.path(), opener, false);

        let handle = reader.open("data.zarr", None, false).await.unwrap();
        let array = reader
            .select_variable(&handle, "temperature", Some("2020-01-02"), None)
            .unwrap();
        assert_eq!(array.dimension("time").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_select_variable_drop_missing_dimension() {
        let dir = tempdir().unwrap();
        let opener = Arc::new(CountingOpener {
            calls: AtomicUsize::new(0),
        });
        let (reader, _) = reader_with(dir.path(), opener, false);

        let handle = reader.open("data.zarr", None, false).await.unwrap();
        let err = reader.select_variable(&handle, "temperature", None, Some("depth"));
        assert!(matches!(err, Err(TilerError::DimensionNotFound(_))));
    }
}
