use crate::config::ApiSettings;
use crate::core::{CacheStoreStats, CachedDatasetReader, DatasetCacheStore, TilerError};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Application state shared across handlers
///
/// The store and reader are constructed once at the composition root and
/// handed in by reference; there is no ambient global cache client.
#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<CachedDatasetReader>,
    pub store: Arc<DatasetCacheStore>,
    pub settings: ApiSettings,
}

/// Query parameters identifying a dataset to open
#[derive(Debug, Deserialize)]
pub struct DatasetParams {
    /// Dataset location (path or URI)
    pub url: String,
    /// Optional group/partition selector
    pub group: Option<String>,
    /// Whether time-like coordinates are decoded
    #[serde(default)]
    pub decode_times: bool,
}

/// Query parameters selecting a variable within a dataset
#[derive(Debug, Deserialize)]
pub struct VariableParams {
    pub variable: String,
    pub datetime: Option<String>,
    pub drop_dim: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VariablesResponse {
    pub variables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DimInfo {
    pub min: String,
    pub max: String,
    pub len: usize,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub dtype: String,
    pub dimensions: BTreeMap<String, DimInfo>,
    pub attrs: BTreeMap<String, String>,
    pub chunk_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

/// Landing document
pub async fn landing(State(state): State<AppState>) -> Json<serde_json::Value> {
    let root = &state.settings.root_path;
    Json(serde_json::json!({
        "title": state.settings.name,
        "links": [
            {"title": "Landing page", "href": format!("{}/", root), "rel": "self"},
            {"title": "Dataset variables", "href": format!("{}/md/variables", root), "rel": "data"},
            {"title": "Dataset dimensions", "href": format!("{}/md/dims", root), "rel": "data"},
            {"title": "Service health", "href": format!("{}/health", root), "rel": "health"},
        ],
    }))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "mdtiler",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /md/variables - list variable names in a dataset
pub async fn variables(
    State(state): State<AppState>,
    Query(params): Query<DatasetParams>,
) -> Result<Json<VariablesResponse>, TilerError> {
    debug!("variables url={}", params.url);

    let handle = state
        .reader
        .open(&params.url, params.group.as_deref(), params.decode_times)
        .await?;

    Ok(Json(VariablesResponse {
        variables: handle.list_variables(),
    }))
}

/// GET /md/dims - per-dimension min/max/len for one variable
pub async fn dims(
    State(state): State<AppState>,
    Query(params): Query<DatasetParams>,
    Query(selection): Query<VariableParams>,
) -> Result<Json<BTreeMap<String, DimInfo>>, TilerError> {
    debug!("dims url={} variable={}", params.url, selection.variable);

    let handle = state
        .reader
        .open(&params.url, params.group.as_deref(), params.decode_times)
        .await?;
    let array = state
        .reader
        .select_variable(&handle, &selection.variable, None, None)?;

    let mut out = BTreeMap::new();
    for dim in &array.dims {
        out.insert(
            dim.name.clone(),
            DimInfo {
                min: dim.min().map(|v| v.to_string()).unwrap_or_default(),
                max: dim.max().map(|v| v.to_string()).unwrap_or_default(),
                len: dim.len(),
            },
        );
    }

    Ok(Json(out))
}

/// GET /md/info - metadata for one selected variable
pub async fn info(
    State(state): State<AppState>,
    Query(params): Query<DatasetParams>,
    Query(selection): Query<VariableParams>,
) -> Result<Json<InfoResponse>, TilerError> {
    debug!(
        "info url={} variable={} datetime={:?} drop_dim={:?}",
        params.url, selection.variable, selection.datetime, selection.drop_dim
    );

    let handle = state
        .reader
        .open(&params.url, params.group.as_deref(), params.decode_times)
        .await?;
    let array = state.reader.select_variable(
        &handle,
        &selection.variable,
        selection.datetime.as_deref(),
        selection.drop_dim.as_deref(),
    )?;

    let mut dimensions = BTreeMap::new();
    for dim in &array.dims {
        dimensions.insert(
            dim.name.clone(),
            DimInfo {
                min: dim.min().map(|v| v.to_string()).unwrap_or_default(),
                max: dim.max().map(|v| v.to_string()).unwrap_or_default(),
                len: dim.len(),
            },
        );
    }

    Ok(Json(InfoResponse {
        name: array.name,
        dtype: array.dtype,
        dimensions,
        attrs: array.attrs,
        chunk_count: array.chunks.len(),
    }))
}

/// GET /cache/stats - store counters
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStoreStats> {
    Json(state.store.stats())
}

/// POST /cache/clear - lifecycle clear, not a request-path operation
pub async fn cache_clear(State(state): State<AppState>) -> Json<ClearResponse> {
    state.store.clear();
    Json(ClearResponse { cleared: true })
}
