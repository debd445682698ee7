//! Configuration data structures for keel.
//!
//! These types map directly to the YAML (also JSON / TOML) configuration document.
//! Keys are camelCase. Everything has a default so that minimal configs remain concise;
//! the storage discriminator `server.dbType` is the one value that must always be set.
use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration document.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub postgres: DbConfig,
    pub mysql: DbConfig,
    pub sqlite: DbConfig,
    pub redis: RedisConfig,
    /// External identity providers keyed by name
    pub oauth: HashMap<String, OAuthConfig>,
    pub cors: CorsConfig,
    pub docker: DockerConfig,
    pub kubernetes: KubeConfig,
}

impl AppConfig {
    /// Connection parameters of the given backend.
    pub fn database(&self, kind: StorageKind) -> &DbConfig {
        match kind {
            StorageKind::Postgres => &self.postgres,
            StorageKind::Mysql => &self.mysql,
            StorageKind::Sqlite => &self.sqlite,
        }
    }
}

/// Runtime mode. Fixed for the lifetime of the process.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    #[serde(rename = "debug", alias = "development", alias = "dev", alias = "test")]
    Development,
    #[serde(rename = "release", alias = "production")]
    Release,
}

impl RunMode {
    pub fn is_release(self) -> bool {
        self == RunMode::Release
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub env: RunMode,
    pub address: String,
    pub port: u16,
    /// Grace period in seconds for in-flight requests on shutdown
    pub graceful_shutdown_period: u64,
    pub rate_limits: Vec<RateLimitConfig>,
    pub jwt_secret: String,
    /// Storage discriminator: `postgres`, `mysql` or `sqlite`
    pub db_type: String,
    /// Password of the seeded `admin` user; no admin is seeded when unset
    pub admin_password: Option<String>,
    /// Directory served in development mode
    pub static_dir: String,
    pub token_ttl_secs: u64,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_period)
    }

    /// Selected storage backend.
    pub fn storage_kind(&self) -> Result<StorageKind, UnknownStorageKind> {
        self.db_type.parse()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            env: RunMode::Development,
            address: "0.0.0.0".to_string(),
            port: 8080,
            graceful_shutdown_period: 30,
            rate_limits: Vec::new(),
            jwt_secret: String::new(),
            db_type: String::new(),
            admin_password: None,
            static_dir: "dist".to_string(),
            token_ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Closed set of storage backends. Exactly one is active per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Postgres,
    Mysql,
    Sqlite,
}

impl StorageKind {
    pub const ALL: [StorageKind; 3] = [StorageKind::Postgres, StorageKind::Mysql, StorageKind::Sqlite];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Postgres => "postgres",
            StorageKind::Mysql => "mysql",
            StorageKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown storage kind '{0}', expected one of: postgres, mysql, sqlite")]
pub struct UnknownStorageKind(pub String);

impl FromStr for StorageKind {
    type Err = UnknownStorageKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageKind::Postgres),
            "mysql" => Ok(StorageKind::Mysql),
            "sqlite" => Ok(StorageKind::Sqlite),
            _ => Err(UnknownStorageKind(s.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    /// Run schema migrations at startup
    pub migrate: bool,
    /// Database file (sqlite only); `:memory:` keeps it in memory
    pub file: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            name: "keel".to_string(),
            user: String::new(),
            password: String::new(),
            migrate: false,
            file: "keel.db".to_string(),
            max_connections: 10,
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct RedisConfig {
    pub enable: bool,
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct OAuthConfig {
    /// Provider type, e.g. `github`
    pub auth_type: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Cross-origin policy of the API.
///
/// Nothing is allowed cross-origin by default; the dashboard bundle is served
/// from the same origin as the API.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct CorsConfig {
    /// Exact origins such as `https://admin.example.com`; `*` allows any origin
    pub allowed_origins: Vec<String>,
    /// Requires an explicit origin list
    pub allow_credentials: bool,
    /// How long browsers may cache a preflight answer
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: false,
            max_age_secs: 24 * 60 * 60,
        }
    }
}

/// Origins admitted by a [`CorsConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<http::HeaderValue>),
}

impl CorsConfig {
    /// Parse the configured origins.
    pub fn origins(&self) -> Result<AllowedOrigins, String> {
        if self.allowed_origins.iter().any(|origin| origin == "*") {
            if self.allow_credentials {
                return Err("'*' cannot be combined with allowCredentials".to_string());
            }
            return Ok(AllowedOrigins::Any);
        }

        self.allowed_origins
            .iter()
            .map(|origin| {
                let trimmed = origin.trim().trim_end_matches('/');
                if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                    return Err(format!("'{origin}' is not an http(s) origin"));
                }
                http::HeaderValue::from_str(trimmed)
                    .map_err(|_| format!("'{origin}' is not a valid origin"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(AllowedOrigins::List)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct DockerConfig {
    pub enable: bool,
    /// `unix:///var/run/docker.sock`, `tcp://host:2375` or `http://host:2375`
    pub host: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: "unix:///var/run/docker.sock".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct KubeConfig {
    pub enable: bool,
    /// Resource kinds mirrored into the local cache
    pub watch_resources: Vec<String>,
    /// Upper bound for the cache warm-up at startup
    pub cache_sync_timeout_secs: u64,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            enable: false,
            watch_resources: vec![
                "namespaces".to_string(),
                "pods".to_string(),
                "services".to_string(),
                "deployments".to_string(),
            ],
            cache_sync_timeout_secs: 30,
        }
    }
}

fn default_status_code() -> u16 {
    429
}

fn default_message() -> String {
    "Too Many Requests".to_string()
}

/// Rate limiting discriminator for how keys are derived.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitBy {
    /// One budget shared by every client
    Server,
    Ip,
    Header,
}

/// Behaviour when a key could not be extracted (missing IP/header etc.).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    Allow,
    Deny,
}

fn default_on_missing_key() -> MissingKeyPolicy {
    MissingKeyPolicy::Allow
}

/// One admission-control rule.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub by: RateLimitBy,
    /// Restricts the rule to paths starting with this prefix
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub header_name: Option<String>, // Should be Some if by == Header
    pub requests: u64,
    pub period: String, // Parsed by humantime, e.g., "1s", "5m", "1h"
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "default_on_missing_key")]
    pub on_missing_key: MissingKeyPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_kind_parsing() {
        assert_eq!("postgres".parse::<StorageKind>(), Ok(StorageKind::Postgres));
        assert_eq!("MySQL".parse::<StorageKind>(), Ok(StorageKind::Mysql));
        assert_eq!(" sqlite ".parse::<StorageKind>(), Ok(StorageKind::Sqlite));
        assert!("oracle".parse::<StorageKind>().is_err());
        assert!("".parse::<StorageKind>().is_err());
    }

    #[test]
    fn test_database_follows_selected_kind() {
        let mut config = AppConfig::default();
        config.sqlite.migrate = true;

        assert!(config.database(StorageKind::Sqlite).migrate);
        assert!(!config.database(StorageKind::Postgres).migrate);
    }

    #[test]
    fn test_run_mode_aliases() {
        let mode: RunMode = serde_json::from_str("\"release\"").unwrap();
        assert!(mode.is_release());
        let mode: RunMode = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(mode, RunMode::Development);
        let mode: RunMode = serde_json::from_str("\"test\"").unwrap();
        assert_eq!(mode, RunMode::Development);
    }

    #[test]
    fn test_cors_origins() {
        let mut cors = CorsConfig::default();
        assert_eq!(cors.origins(), Ok(AllowedOrigins::List(Vec::new())));

        cors.allowed_origins = vec!["https://admin.example.com/".to_string()];
        assert_eq!(
            cors.origins(),
            Ok(AllowedOrigins::List(vec![http::HeaderValue::from_static(
                "https://admin.example.com"
            )]))
        );

        cors.allowed_origins.push("*".to_string());
        assert_eq!(cors.origins(), Ok(AllowedOrigins::Any));
        cors.allow_credentials = true;
        assert!(cors.origins().is_err());
    }
}
