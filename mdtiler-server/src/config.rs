use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub logging: LoggingConfig,
}

/// HTTP API settings; env overrides use the `APP_` prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub cors_allow_methods: Vec<String>,
    pub cachecontrol: String,
    pub root_path: String,
}

/// Dataset cache settings; env overrides use the `CACHE_` prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Entry lifetime in seconds
    pub ttl: u64,
    /// Store cap in bytes
    pub max_size: u64,
    /// Storage location; absent means a temp-dir default
    pub directory: Option<PathBuf>,
    /// When set, every open bypasses the cache entirely
    pub disable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                name: "mdtiler".to_string(),
                host: "0.0.0.0".to_string(),
                port: 8000,
                cors_origins: vec!["*".to_string()],
                cors_allow_methods: vec!["GET".to_string()],
                cachecontrol: "public, max-age=3600".to_string(),
                root_path: String::new(),
            },
            cache: CacheSettings {
                ttl: 300,
                max_size: 5_120_000_000,
                directory: None,
                disable: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&content)?;
        config.cache.normalize();
        Ok(config)
    }

    /// Apply `APP_*` / `CACHE_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("APP_NAME") {
            self.api.name = v;
        }
        if let Ok(v) = std::env::var("APP_HOST") {
            self.api.host = v;
        }
        if let Ok(v) = std::env::var("APP_PORT") {
            if let Ok(port) = v.parse() {
                self.api.port = port;
            }
        }
        if let Ok(v) = std::env::var("APP_CORS_ORIGINS") {
            self.api.cors_origins = parse_list(&v);
        }
        if let Ok(v) = std::env::var("APP_CORS_ALLOW_METHODS") {
            self.api.cors_allow_methods = parse_list(&v)
                .into_iter()
                .map(|m| m.to_uppercase())
                .collect();
        }
        if let Ok(v) = std::env::var("APP_CACHECONTROL") {
            self.api.cachecontrol = v;
        }
        if let Ok(v) = std::env::var("APP_ROOT_PATH") {
            self.api.root_path = v;
        }

        if let Ok(v) = std::env::var("CACHE_TTL") {
            if let Ok(ttl) = v.parse() {
                self.cache.ttl = ttl;
            }
        }
        if let Ok(v) = std::env::var("CACHE_MAXSIZE") {
            if let Ok(max_size) = v.parse() {
                self.cache.max_size = max_size;
            }
        }
        if let Ok(v) = std::env::var("CACHE_DIRECTORY") {
            self.cache.directory = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("CACHE_DISABLE") {
            self.cache.disable = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        self.cache.normalize();
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

impl CacheSettings {
    /// A disabled cache keeps no entries and no lifetime
    pub fn normalize(&mut self) {
        if self.disable {
            self.ttl = 0;
            self.max_size = 0;
        }
    }
}

/// Split a comma-separated env value into trimmed items
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
