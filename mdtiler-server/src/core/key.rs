use sha2::{Digest, Sha256};

/// Identity key for one way of opening a dataset
///
/// Derived deterministically from (location, group, decode flag); the store
/// treats the key as an opaque string and knows nothing about datasets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text: String,
}

impl CacheKey {
    /// Derive the key for (location, group, decode_time_like)
    ///
    /// The group segment is quoted so that an absent group can never collide
    /// with a group literally named "None".
    pub fn new(location: &str, group: Option<&str>, decode_time_like: bool) -> Self {
        let group = match group {
            Some(g) => format!("\"{}\"", g),
            None => "null".to_string(),
        };
        Self {
            text: format!("{}_group:{}_time:{}", location, group, decode_time_like),
        }
    }

    /// Opaque key text, as handed to the store
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Stable sha256 hex digest, used as the on-disk entry filename
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}
