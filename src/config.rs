//! Layered application settings.
//!
//! Sources, lowest precedence first: built-in defaults, `config/default.toml`,
//! `config/{APP_ENV}.toml`, then `APP__*` environment variables.

use std::{collections::HashSet, env, path::Path};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";
const DEVELOPMENT: &str = "development";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const MIN_SECRET_LEN: usize = 64;
const MIN_SECRET_DISTINCT_CHARS: usize = 10;

/// Shipped in `config/development.toml`; refused anywhere else.
pub const DEV_JWT_SECRET: &str =
    "k-to-drinks-development-only-signing-key-do-not-use-in-production-0123456789";

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "defaults::host")]
    pub host: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
    /// `development`, `test`, `production`...
    #[serde(default = "defaults::environment")]
    pub environment: String,

    #[validate(custom = "check_jwt_secret")]
    pub jwt_secret: String,
    /// Access token lifetime, seconds
    #[serde(default = "defaults::jwt_expiration")]
    pub jwt_expiration: usize,
    /// Refresh token lifetime, seconds
    #[serde(default = "defaults::refresh_token_expiration")]
    pub refresh_token_expiration: usize,
    #[serde(default = "defaults::auth_issuer")]
    pub auth_issuer: String,
    #[serde(default = "defaults::auth_audience")]
    pub auth_audience: String,

    #[serde(default = "defaults::log_level")]
    #[validate(custom = "check_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub auto_migrate: bool,
    #[serde(default = "defaults::db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "defaults::db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "defaults::db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "defaults::db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "defaults::db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Comma-separated origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Fraction of the subtotal charged as tax on orders
    #[serde(default = "defaults::tax_rate")]
    #[validate(custom = "check_tax_rate")]
    pub default_tax_rate: f64,
    /// Root directory for uploaded delivery signatures
    #[serde(default = "defaults::media_root")]
    pub media_root: String,
}

mod defaults {
    pub fn host() -> String {
        "0.0.0.0".to_string()
    }
    pub fn port() -> u16 {
        8000
    }
    pub fn environment() -> String {
        super::DEVELOPMENT.to_string()
    }
    pub fn jwt_expiration() -> usize {
        86_400
    }
    pub fn refresh_token_expiration() -> usize {
        604_800
    }
    pub fn auth_issuer() -> String {
        "k-to-drinks-api".to_string()
    }
    pub fn auth_audience() -> String {
        "k-to-drinks-clients".to_string()
    }
    pub fn log_level() -> String {
        "info".to_string()
    }
    pub fn db_max_connections() -> u32 {
        10
    }
    pub fn db_min_connections() -> u32 {
        1
    }
    pub fn db_connect_timeout_secs() -> u64 {
        30
    }
    pub fn db_idle_timeout_secs() -> u64 {
        600
    }
    pub fn db_acquire_timeout_secs() -> u64 {
        8
    }
    pub fn tax_rate() -> f64 {
        0.02
    }
    pub fn media_root() -> String {
        "media".to_string()
    }
}

impl AppConfig {
    /// Settings with every optional key at its default.
    pub fn with_defaults(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: defaults::host(),
            port: defaults::port(),
            environment: defaults::environment(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration: defaults::jwt_expiration(),
            refresh_token_expiration: defaults::refresh_token_expiration(),
            auth_issuer: defaults::auth_issuer(),
            auth_audience: defaults::auth_audience(),
            log_level: defaults::log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: defaults::db_max_connections(),
            db_min_connections: defaults::db_min_connections(),
            db_connect_timeout_secs: defaults::db_connect_timeout_secs(),
            db_idle_timeout_secs: defaults::db_idle_timeout_secs(),
            db_acquire_timeout_secs: defaults::db_acquire_timeout_secs(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            default_tax_rate: defaults::tax_rate(),
            media_root: defaults::media_root(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEVELOPMENT)
    }

    /// Non-empty, trimmed entries of `cors_allowed_origins`.
    pub fn cors_origins(&self) -> Vec<&str> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .collect()
    }

    /// Any origin is accepted in development or when explicitly opted in.
    pub fn allows_any_origin(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Rules that span several keys or depend on the environment.
    fn check_deployment(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.allows_any_origin() && self.cors_origins().is_empty() {
            errors.add(
                "cors_allowed_origins",
                invalid(
                    "cors_origins_required",
                    "set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true outside development",
                ),
            );
        }
        if !self.is_development() && self.jwt_secret.trim() == DEV_JWT_SECRET {
            errors.add(
                "jwt_secret",
                invalid(
                    "jwt_secret_dev_default",
                    "the development signing key is only accepted in development",
                ),
            );
        }
        if self.db_min_connections > self.db_max_connections {
            errors.add(
                "db_min_connections",
                invalid(
                    "db_pool_bounds",
                    "db_min_connections cannot exceed db_max_connections",
                ),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("could not load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn check_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(invalid(
            "log_level",
            "expected one of trace, debug, info, warn, error",
        ))
    }
}

fn check_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let secret = secret.trim();
    if secret.len() < MIN_SECRET_LEN {
        return Err(invalid(
            "jwt_secret_length",
            "jwt_secret must be at least 64 characters",
        ));
    }
    let distinct: HashSet<char> = secret.chars().collect();
    if distinct.len() < MIN_SECRET_DISTINCT_CHARS {
        return Err(invalid(
            "jwt_secret_entropy",
            "jwt_secret must use at least 10 distinct characters",
        ));
    }
    Ok(())
}

fn check_tax_rate(rate: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(invalid(
            "default_tax_rate",
            "default_tax_rate must be between 0.0 and 1.0",
        ))
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("k_to_drinks_api={level},tower_http=info")));

    let builder = fmt().with_env_filter(filter).with_target(true);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("APP_ENV").unwrap_or_else(|_| DEVELOPMENT.to_string());
    if !Path::new(CONFIG_DIR).is_dir() {
        warn!(dir = CONFIG_DIR, "config directory missing; using defaults and APP__* variables");
    }

    let settings = Config::builder()
        .set_default("database_url", "sqlite://k_to_drinks.db?mode=rwc")?
        .set_default("environment", run_env.as_str())?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let cfg: AppConfig = settings.try_deserialize()?;
    if let Err(e) = cfg.validate().and_then(|_| cfg.check_deployment()) {
        error!(error = %e, "configuration rejected");
        return Err(e.into());
    }

    info!(environment = %cfg.environment, port = cfg.port, "configuration loaded");
    Ok(cfg)
}
