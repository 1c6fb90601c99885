use super::error::{Result, TilerError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A coordinate value along a dimension
///
/// Time-like coordinates become `Time` once decoded (RFC 3339 text, which
/// sorts lexically); everything else stays numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordValue {
    Number(f64),
    Time(String),
}

impl CoordValue {
    /// Ordering within the same variant; mixed variants compare Number < Time
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Number(_), Self::Time(_)) => Ordering::Less,
            (Self::Time(_), Self::Number(_)) => Ordering::Greater,
        }
    }

    /// Check whether this coordinate matches a textual selector
    ///
    /// Time values match on equality, or on a prefix that ends at the
    /// date/time boundary ("2020-01-01" selects "2020-01-01T00:00:00", but
    /// "2020" selects nothing); numbers match when the selector parses to
    /// the same value.
    pub fn matches(&self, selector: &str) -> bool {
        match self {
            Self::Time(t) => {
                if t == selector {
                    return true;
                }
                matches!(
                    t.strip_prefix(selector).and_then(|rest| rest.chars().next()),
                    Some('T') | Some(' ')
                )
            }
            Self::Number(n) => selector.parse::<f64>().map(|v| v == *n).unwrap_or(false),
        }
    }
}

impl std::fmt::Display for CoordValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Time(t) => write!(f, "{}", t),
        }
    }
}

/// A named dimension with its coordinate values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub values: Vec<CoordValue>,
}

impl Dimension {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> Option<&CoordValue> {
        self.values
            .iter()
            .reduce(|a, b| if b.compare(a) == Ordering::Less { b } else { a })
    }

    pub fn max(&self) -> Option<&CoordValue> {
        self.values
            .iter()
            .reduce(|a, b| if b.compare(a) == Ordering::Greater { b } else { a })
    }

    /// Whether this dimension carries decoded time coordinates
    pub fn is_time_like(&self) -> bool {
        self.name == "time" || matches!(self.values.first(), Some(CoordValue::Time(_)))
    }
}

/// Reference to a lazily-loadable chunk of array data
///
/// Never dereferenced by the cache subsystem; carried through serialization
/// so a reconstructed handle can still reach its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Storage path of the chunk relative to the dataset location
    pub path: String,
    /// Position in the chunk grid, one index per dimension
    pub index: Vec<u64>,
}

/// A named array within a dataset: dimensions, attributes and chunk index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayHandle {
    pub name: String,
    pub dtype: String,
    pub dims: Vec<Dimension>,
    pub attrs: BTreeMap<String, String>,
    pub chunks: Vec<ChunkRef>,
}

impl ArrayHandle {
    /// Look up a dimension by name
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dims.iter().find(|d| d.name == name)
    }

    /// Select the slice matching `selector` along the named dimension
    ///
    /// The dimension is kept at length 1; chunk references outside the
    /// selected slab are filtered out. Read-only: returns a derived view.
    pub fn select_along_dimension(&self, dim: &str, selector: &str) -> Result<ArrayHandle> {
        let axis = self
            .dims
            .iter()
            .position(|d| d.name == dim)
            .ok_or_else(|| TilerError::DimensionNotFound(dim.to_string()))?;

        let dimension = &self.dims[axis];
        let position = dimension
            .values
            .iter()
            .position(|v| v.matches(selector))
            .or_else(|| nearest_position(&dimension.values, selector))
            .ok_or_else(|| {
                TilerError::InvalidRequest(format!(
                    "no slice matching '{}' along dimension '{}'",
                    selector, dim
                ))
            })?;

        let mut dims = self.dims.clone();
        dims[axis] = Dimension {
            name: dimension.name.clone(),
            values: vec![dimension.values[position].clone()],
        };

        let chunk = chunk_of(position, dimension.len(), &self.chunks, axis);
        let chunks = self
            .chunks
            .iter()
            .filter(|c| c.index.get(axis).copied() == Some(chunk))
            .cloned()
            .collect();

        Ok(ArrayHandle {
            name: self.name.clone(),
            dtype: self.dtype.clone(),
            dims,
            attrs: self.attrs.clone(),
            chunks,
        })
    }

    /// Drop the named dimension, keeping its first slice
    pub fn drop_dimension(&self, dim: &str) -> Result<ArrayHandle> {
        let axis = self
            .dims
            .iter()
            .position(|d| d.name == dim)
            .ok_or_else(|| TilerError::DimensionNotFound(dim.to_string()))?;

        let mut dims = self.dims.clone();
        dims.remove(axis);

        let chunks = self
            .chunks
            .iter()
            .filter(|c| c.index.get(axis).copied() == Some(0))
            .map(|c| {
                let mut index = c.index.clone();
                index.remove(axis);
                ChunkRef {
                    path: c.path.clone(),
                    index,
                }
            })
            .collect();

        Ok(ArrayHandle {
            name: self.name.clone(),
            dtype: self.dtype.clone(),
            dims,
            attrs: self.attrs.clone(),
            chunks,
        })
    }
}

/// Chunk-grid coordinate containing coordinate position `position`,
/// assuming uniform chunking along the axis
fn chunk_of(position: usize, dim_len: usize, chunks: &[ChunkRef], axis: usize) -> u64 {
    let grid = chunks
        .iter()
        .filter_map(|c| c.index.get(axis))
        .max()
        .map(|m| m + 1)
        .unwrap_or(1);
    if dim_len == 0 {
        return 0;
    }
    (position as u64 * grid) / dim_len as u64
}

/// Nearest numeric coordinate when no value matches the selector exactly
fn nearest_position(values: &[CoordValue], selector: &str) -> Option<usize> {
    let target: f64 = selector.parse().ok()?;
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| match v {
            CoordValue::Number(n) => Some((i, (n - target).abs())),
            CoordValue::Time(_) => None,
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
}

/// Live, queryable in-memory representation of an opened dataset
///
/// Owned by the caller for the duration of one request; sharing between
/// requests happens at the serialized-snapshot level, never on live handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetHandle {
    pub location: String,
    pub group: Option<String>,
    pub decode_time_like: bool,
    pub attrs: BTreeMap<String, String>,
    pub variables: BTreeMap<String, ArrayHandle>,
}

impl DatasetHandle {
    /// Names of all variables in the dataset
    pub fn list_variables(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    /// Look up a variable by name
    pub fn get_variable(&self, name: &str) -> Result<&ArrayHandle> {
        self.variables
            .get(name)
            .ok_or_else(|| TilerError::VariableNotFound(name.to_string()))
    }
}
