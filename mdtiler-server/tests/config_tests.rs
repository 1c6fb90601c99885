use mdtiler_server::ServerConfig;
use tempfile::tempdir;

#[test]
fn test_config_from_yaml_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        r#"
api:
  name: "test tiler"
  host: "127.0.0.1"
  port: 9000
  cors_origins: ["https://maps.example"]
  cors_allow_methods: ["GET", "HEAD"]
  cachecontrol: "public, max-age=60"
  root_path: "/tiles"
cache:
  ttl: 60
  max_size: 1048576
  directory: "/var/cache/mdtiler"
  disable: false
logging:
  level: "debug"
  format: "json"
"#,
    )
    .unwrap();

    let config = ServerConfig::from_file(&path).unwrap();

    assert_eq!(config.api.name, "test tiler");
    assert_eq!(config.server_addr(), "127.0.0.1:9000");
    assert_eq!(config.api.cors_origins, vec!["https://maps.example"]);
    assert_eq!(config.api.root_path, "/tiles");
    assert_eq!(config.cache.ttl, 60);
    assert_eq!(config.cache.max_size, 1_048_576);
    assert_eq!(
        config.cache.directory.as_deref(),
        Some(std::path::Path::new("/var/cache/mdtiler"))
    );
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_from_file_normalizes_disabled_cache() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        r#"
api:
  name: "mdtiler"
  host: "0.0.0.0"
  port: 8000
  cors_origins: ["*"]
  cors_allow_methods: ["GET"]
  cachecontrol: "no-store"
  root_path: ""
cache:
  ttl: 300
  max_size: 1024
  disable: true
logging:
  level: "info"
  format: "json"
"#,
    )
    .unwrap();

    let config = ServerConfig::from_file(&path).unwrap();
    assert!(config.cache.disable);
    assert_eq!(config.cache.ttl, 0);
    assert_eq!(config.cache.max_size, 0);
}

#[test]
fn test_config_missing_file_is_an_error() {
    assert!(ServerConfig::from_file("/nonexistent/config.yaml").is_err());
}

// All env manipulation lives in one test so parallel test threads never
// observe each other's process environment.
#[test]
fn test_env_overrides() {
    fn with_env(vars: &[(&str, &str)], f: impl FnOnce()) {
        for (k, v) in vars {
            unsafe { std::env::set_var(k, v) };
        }
        f();
        for (k, _) in vars {
            unsafe { std::env::remove_var(k) };
        }
    }

    with_env(
        &[
            ("APP_NAME", "ocean tiler"),
            ("APP_PORT", "9100"),
            ("APP_CORS_ORIGINS", "https://a.example, https://b.example"),
            ("APP_CORS_ALLOW_METHODS", "get, head"),
            ("APP_CACHECONTROL", "no-store"),
            ("CACHE_TTL", "42"),
            ("CACHE_MAXSIZE", "2048"),
            ("CACHE_DIRECTORY", "/var/cache/env-tiler"),
        ],
        || {
            let mut config = ServerConfig::default();
            config.apply_env();

            assert_eq!(config.api.name, "ocean tiler");
            assert_eq!(config.api.port, 9100);
            assert_eq!(
                config.api.cors_origins,
                vec!["https://a.example".to_string(), "https://b.example".to_string()]
            );
            // Methods are upper-cased so the router can parse them
            assert_eq!(
                config.api.cors_allow_methods,
                vec!["GET".to_string(), "HEAD".to_string()]
            );
            assert_eq!(config.api.cachecontrol, "no-store");
            assert_eq!(config.cache.ttl, 42);
            assert_eq!(config.cache.max_size, 2048);
            assert_eq!(
                config.cache.directory.as_deref(),
                Some(std::path::Path::new("/var/cache/env-tiler"))
            );
        },
    );

    // An unparseable port leaves the default untouched
    with_env(&[("APP_PORT", "not-a-port")], || {
        let mut config = ServerConfig::default();
        config.apply_env();
        assert_eq!(config.api.port, 8000);
    });

    // Disable truthiness and post-override normalization
    for truthy in ["1", "true", "yes", "TRUE", "Yes"] {
        with_env(&[("CACHE_DISABLE", truthy)], || {
            let mut config = ServerConfig::default();
            config.apply_env();
            assert!(config.cache.disable, "{truthy:?} should disable the cache");
            assert_eq!(config.cache.ttl, 0);
            assert_eq!(config.cache.max_size, 0);
        });
    }
    for falsy in ["0", "false", "no", ""] {
        with_env(&[("CACHE_DISABLE", falsy)], || {
            let mut config = ServerConfig::default();
            config.apply_env();
            assert!(!config.cache.disable, "{falsy:?} should keep the cache on");
            assert_eq!(config.cache.ttl, 300);
        });
    }
}
