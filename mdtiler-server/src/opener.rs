//! Filesystem dataset opener
//!
//! The service's authoritative `DatasetOpener`: parses a consolidated
//! metadata document (`.zmetadata`, falling back to `dataset.json`) beneath
//! the dataset location into a live handle. Chunk payloads are never read
//! here; only their references are carried on the handle.

use crate::core::dataset::{ArrayHandle, ChunkRef, CoordValue, DatasetHandle, Dimension};
use crate::core::error::{Result, TilerError};
use crate::core::reader::DatasetOpener;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONSOLIDATED_NAMES: [&str; 2] = [".zmetadata", "dataset.json"];

#[derive(Debug, Deserialize)]
struct DatasetDoc {
    #[serde(default)]
    attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dimensions: BTreeMap<String, DimensionDoc>,
    #[serde(default)]
    variables: BTreeMap<String, VariableDoc>,
    #[serde(default)]
    groups: BTreeMap<String, DatasetDoc>,
}

#[derive(Debug, Deserialize)]
struct DimensionDoc {
    values: Vec<serde_json::Value>,
    #[serde(default)]
    units: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VariableDoc {
    #[serde(default = "default_dtype")]
    dtype: String,
    dimensions: Vec<String>,
    #[serde(default)]
    attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    chunks: Vec<ChunkDoc>,
}

#[derive(Debug, Deserialize)]
struct ChunkDoc {
    path: String,
    index: Vec<u64>,
}

fn default_dtype() -> String {
    "float64".to_string()
}

/// Opens datasets from local or mounted storage
#[derive(Debug, Default, Clone)]
pub struct FileSystemOpener;

impl FileSystemOpener {
    pub fn new() -> Self {
        Self
    }

    fn metadata_path(location: &str) -> Result<PathBuf> {
        let base = Path::new(location);
        if base.is_file() {
            return Ok(base.to_path_buf());
        }
        for name in CONSOLIDATED_NAMES {
            let candidate = base.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(TilerError::SourceOpenFailed(format!(
            "no consolidated metadata found under '{}'",
            location
        )))
    }
}

impl DatasetOpener for FileSystemOpener {
    fn open(
        &self,
        location: &str,
        group: Option<&str>,
        decode_time_like: bool,
    ) -> Result<DatasetHandle> {
        let path = Self::metadata_path(location)?;
        debug!("Opening dataset metadata at {:?}", path);

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            TilerError::SourceOpenFailed(format!("failed to read '{}': {}", location, e))
        })?;
        let root: DatasetDoc = serde_json::from_str(&contents).map_err(|e| {
            TilerError::SourceOpenFailed(format!("malformed dataset metadata: {}", e))
        })?;

        let mut doc = &root;
        if let Some(group) = group {
            for part in group.split('/').filter(|p| !p.is_empty()) {
                doc = doc.groups.get(part).ok_or_else(|| {
                    TilerError::SourceOpenFailed(format!("unknown group '{}'", group))
                })?;
            }
        }

        build_handle(doc, location, group, decode_time_like)
    }
}

fn build_handle(
    doc: &DatasetDoc,
    location: &str,
    group: Option<&str>,
    decode_time_like: bool,
) -> Result<DatasetHandle> {
    let mut dimensions = BTreeMap::new();
    for (name, dim) in &doc.dimensions {
        dimensions.insert(
            name.clone(),
            Dimension {
                name: name.clone(),
                values: coord_values(dim, decode_time_like)?,
            },
        );
    }

    let mut variables = BTreeMap::new();
    for (name, var) in &doc.variables {
        let mut dims = Vec::with_capacity(var.dimensions.len());
        for dim_name in &var.dimensions {
            let dim = dimensions.get(dim_name).ok_or_else(|| {
                TilerError::SourceOpenFailed(format!(
                    "variable '{}' references undefined dimension '{}'",
                    name, dim_name
                ))
            })?;
            dims.push(dim.clone());
        }

        variables.insert(
            name.clone(),
            ArrayHandle {
                name: name.clone(),
                dtype: var.dtype.clone(),
                dims,
                attrs: attr_strings(&var.attributes),
                chunks: var
                    .chunks
                    .iter()
                    .map(|c| ChunkRef {
                        path: c.path.clone(),
                        index: c.index.clone(),
                    })
                    .collect(),
            },
        );
    }

    Ok(DatasetHandle {
        location: location.to_string(),
        group: group.map(|g| g.to_string()),
        decode_time_like,
        attrs: attr_strings(&doc.attributes),
        variables,
    })
}

/// Coordinate values for one dimension, decoding "<unit> since <date>"
/// numerics into RFC 3339 text when requested
fn coord_values(dim: &DimensionDoc, decode_time_like: bool) -> Result<Vec<CoordValue>> {
    let numbers: Option<Vec<f64>> = dim.values.iter().map(|v| v.as_f64()).collect();

    if decode_time_like {
        if let (Some(numbers), Some(units)) = (&numbers, &dim.units) {
            if let Some(decoded) = decode_epoch_values(numbers, units) {
                return Ok(decoded.into_iter().map(CoordValue::Time).collect());
            }
        }
    }

    dim.values
        .iter()
        .map(|v| match v {
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(CoordValue::Number)
                .ok_or_else(|| TilerError::SourceOpenFailed("non-finite coordinate".to_string())),
            serde_json::Value::String(s) => Ok(CoordValue::Time(s.clone())),
            other => Err(TilerError::SourceOpenFailed(format!(
                "unsupported coordinate value: {}",
                other
            ))),
        })
        .collect()
}

/// Decode numeric offsets against a "<unit> since <base>" epoch
fn decode_epoch_values(values: &[f64], units: &str) -> Option<Vec<String>> {
    let (unit, base) = units.split_once(" since ")?;
    let seconds_per: f64 = match unit.trim() {
        "days" | "day" => 86_400.0,
        "hours" | "hour" => 3_600.0,
        "minutes" | "minute" => 60.0,
        "seconds" | "second" => 1.0,
        _ => return None,
    };
    let base = parse_base_datetime(base.trim())?;

    values
        .iter()
        .map(|v| {
            let offset = TimeDelta::try_seconds((v * seconds_per).round() as i64)?;
            let dt = base.checked_add_signed(offset)?;
            Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        })
        .collect()
}

fn parse_base_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn attr_strings(attrs: &BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    attrs
        .iter()
        .map(|(k, v)| {
            let text = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}
