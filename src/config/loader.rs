use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::AppConfig;

/// Environment variable prefix for overrides, e.g. `KEEL__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "KEEL";

/// Load configuration from a file using the config crate.
///
/// Supports YAML (default), JSON and TOML, picked by extension. Variables named
/// `KEEL__<SECTION>__<KEY>` override file values; the config crate lowercases
/// those keys, so only single-word keys (`port`, `address`, `env`, ...) can be
/// overridden this way.
pub fn load_config(config_path: impl AsRef<Path>) -> Result<AppConfig> {
    let config_path = config_path.as_ref();

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        _ => FileFormat::Yaml, // Default to YAML
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let app_config: AppConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(app_config)
}

/// Starter configuration written by `keel init`.
pub const STARTER_CONFIG: &str = r#"server:
  env: debug
  address: 0.0.0.0
  port: 8080
  gracefulShutdownPeriod: 30
  jwtSecret: change-me
  dbType: sqlite
  adminPassword: admin
  staticDir: dist
  rateLimits:
    - by: ip
      requests: 100
      period: 1s

postgres:
  host: 127.0.0.1
  port: 5432
  name: keel
  user: postgres
  password: postgres
  migrate: true

mysql:
  host: 127.0.0.1
  port: 3306
  name: keel
  user: root
  password: root
  migrate: true

sqlite:
  file: keel.db
  migrate: true

redis:
  enable: false
  host: 127.0.0.1
  port: 6379
  password: ""

oauth: {}

cors:
  allowedOrigins: []
  allowCredentials: false
  maxAgeSecs: 86400

docker:
  enable: false
  host: unix:///var/run/docker.sock

kubernetes:
  enable: false
  watchResources:
    - namespaces
    - pods
    - services
    - deployments
"#;

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::{RateLimitBy, RunMode, StorageKind};

    #[test]
    fn test_load_yaml_config() {
        let yaml_content = r#"
server:
  env: release
  port: 9090
  gracefulShutdownPeriod: 5
  jwtSecret: secret
  dbType: mysql
  rateLimits:
    - by: header
      headerName: x-api-key
      requests: 10
      period: 1m
mysql:
  host: db
  port: 3306
  migrate: true
kubernetes:
  enable: true
  watchResources: [pods]
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.env, RunMode::Release);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.storage_kind(), Ok(StorageKind::Mysql));
        assert!(config.database(StorageKind::Mysql).migrate);
        assert_eq!(config.server.rate_limits.len(), 1);
        assert_eq!(config.server.rate_limits[0].by, RateLimitBy::Header);
        assert_eq!(config.server.rate_limits[0].status_code, 429);
        assert_eq!(config.kubernetes.watch_resources, vec!["pods".to_string()]);
        // untouched sections keep their defaults
        assert!(!config.docker.enable);
        assert_eq!(config.server.static_dir, "dist");
    }

    #[test]
    fn test_load_json_config() {
        let json_content = r#"
{
  "server": { "dbType": "sqlite", "jwtSecret": "s" },
  "sqlite": { "file": ":memory:" },
  "oauth": { "github": { "authType": "github", "clientId": "id", "clientSecret": "secret" } }
}
"#;

        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        write!(temp_file, "{}", json_content).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.env, RunMode::Development);
        assert_eq!(config.sqlite.file, ":memory:");
        assert_eq!(config.oauth["github"].client_id, "id");
    }

    #[test]
    fn test_starter_config_parses() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", STARTER_CONFIG).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.storage_kind(), Ok(StorageKind::Sqlite));
        assert_eq!(config.server.admin_password.as_deref(), Some("admin"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config("/definitely/not/here.yaml").is_err());
    }
}
