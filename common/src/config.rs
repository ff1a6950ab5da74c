//! Application configuration.
//!
//! Loaded once from the environment at startup and passed down inside the
//! application state.

use std::path::PathBuf;

use tracing::warn;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/gateway.db?mode=rwc";
const DEFAULT_BUCKET_DIR: &str = "data/bucket";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name reported in response metadata and health checks.
    pub service_name: String,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Connection registry store (sqlx URL).
    pub database_url: String,
    /// Directory holding uploaded blobs.
    pub bucket_dir: PathBuf,
    /// Upper bound on opening a data source session, in seconds.
    pub connect_timeout_secs: u64,
    /// Registry pool size.
    pub max_connections: u32,
    /// Whether executed queries are appended to the query log.
    pub query_log_enabled: bool,
    /// Request body limit for bucket uploads.
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "gateway".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bucket_dir: PathBuf::from(DEFAULT_BUCKET_DIR),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            query_log_enabled: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment variables for the named service.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            host: lookup("SERVER_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "SERVER_PORT", defaults.port),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bucket_dir: lookup("BUCKET_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.bucket_dir),
            connect_timeout_secs: parse_or(
                &lookup,
                "CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            ),
            max_connections: parse_or(&lookup, "MAX_CONNECTIONS", defaults.max_connections),
            query_log_enabled: lookup("QUERY_LOG_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.query_log_enabled),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }

    /// Bind address in `host:port` form.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable configuration value");
            default
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
