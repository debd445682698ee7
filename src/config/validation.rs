use std::net::IpAddr;

use crate::{
    config::models::{AppConfig, RateLimitBy, RateLimitConfig, StorageKind},
    core::rate_limiter::parse_period,
    ports::orchestrator::ResourceKind,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Checks a loaded configuration and reports every problem at once.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire configuration
    pub fn validate(config: &AppConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if config.server.address.parse::<IpAddr>().is_err() && config.server.address != "localhost" {
            errors.push(ValidationError::InvalidField {
                field: "server.address".to_string(),
                message: format!("'{}' is not an IP address", config.server.address),
            });
        }

        if config.server.port == 0 {
            errors.push(ValidationError::InvalidField {
                field: "server.port".to_string(),
                message: "Port must be greater than 0".to_string(),
            });
        }

        if config.server.jwt_secret.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "server.jwtSecret".to_string(),
            });
        }

        if config.server.token_ttl_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "server.tokenTtlSecs".to_string(),
                message: "Token lifetime must be greater than 0".to_string(),
            });
        }

        match config.server.storage_kind() {
            Ok(kind) => errors.extend(Self::validate_database(config, kind)),
            Err(e) => errors.push(ValidationError::InvalidField {
                field: "server.dbType".to_string(),
                message: e.to_string(),
            }),
        }

        for (i, rule) in config.server.rate_limits.iter().enumerate() {
            if let Err(e) = Self::validate_rate_limit(i, rule) {
                errors.push(e);
            }
        }

        if let Err(message) = config.cors.origins() {
            errors.push(ValidationError::InvalidField {
                field: "cors.allowedOrigins".to_string(),
                message,
            });
        }

        if config.docker.enable && config.docker.host.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "docker.host".to_string(),
            });
        }

        if config.kubernetes.enable {
            for resource in &config.kubernetes.watch_resources {
                if resource.parse::<ResourceKind>().is_err() {
                    errors.push(ValidationError::InvalidField {
                        field: "kubernetes.watchResources".to_string(),
                        message: format!("Unsupported resource kind '{resource}'"),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_database(config: &AppConfig, kind: StorageKind) -> Vec<ValidationError> {
        let db = config.database(kind);
        let mut errors = Vec::new();
        match kind {
            StorageKind::Sqlite => {
                if db.file.trim().is_empty() {
                    errors.push(ValidationError::MissingField {
                        field: "sqlite.file".to_string(),
                    });
                }
            }
            StorageKind::Postgres | StorageKind::Mysql => {
                if db.host.trim().is_empty() {
                    errors.push(ValidationError::MissingField {
                        field: format!("{kind}.host"),
                    });
                }
                if db.name.trim().is_empty() {
                    errors.push(ValidationError::MissingField {
                        field: format!("{kind}.name"),
                    });
                }
            }
        }
        if db.max_connections == 0 {
            errors.push(ValidationError::InvalidField {
                field: format!("{kind}.maxConnections"),
                message: "Pool size must be greater than 0".to_string(),
            });
        }
        errors
    }

    fn validate_rate_limit(index: usize, config: &RateLimitConfig) -> ValidationResult<()> {
        let field = format!("server.rateLimits[{index}]");
        if config.requests == 0 {
            return Err(ValidationError::InvalidField {
                field: format!("{field}.requests"),
                message: "Rate limit requests must be greater than 0".to_string(),
            });
        }

        if let Err(e) = parse_period(&config.period) {
            return Err(ValidationError::InvalidField {
                field: format!("{field}.period"),
                message: e,
            });
        }

        if config.by == RateLimitBy::Header
            && config
                .header_name
                .as_deref()
                .is_none_or(|h| h.trim().is_empty())
        {
            return Err(ValidationError::MissingField {
                field: format!("{field}.headerName"),
            });
        }

        if http::StatusCode::from_u16(config.status_code).is_err() {
            return Err(ValidationError::InvalidField {
                field: format!("{field}.statusCode"),
                message: format!("{} is not an HTTP status code", config.status_code),
            });
        }

        Ok(())
    }

    /// Format multiple validation errors into a readable message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
