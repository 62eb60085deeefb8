use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

const CONFIG_DIR: &str = "config";

/// Fallback values used when neither files nor `APP__*` variables set a key.
mod defaults {
    pub const ENVIRONMENT: &str = "development";
    pub const LOG_LEVEL: &str = "info";
    pub const PORT: u16 = 8080;
    pub const HOST: &str = "0.0.0.0";
    pub const DATABASE_URL: &str = "sqlite://backoffice.db?mode=rwc";

    pub fn log_level() -> String {
        LOG_LEVEL.to_string()
    }
    pub fn port() -> u16 {
        PORT
    }
    pub fn auth_issuer() -> String {
        "backoffice-auth".to_string()
    }
    pub fn auth_audience() -> String {
        "backoffice-api".to_string()
    }
    pub fn pool_max() -> u32 {
        16
    }
    pub fn pool_min() -> u32 {
        2
    }
    pub fn connect_timeout() -> u64 {
        30
    }
    pub fn idle_timeout() -> u64 {
        600
    }
    pub fn acquire_timeout() -> u64 {
        8
    }
    pub fn store_timeout() -> u64 {
        10
    }
    pub fn page_size() -> u64 {
        20
    }
    pub fn max_page_size() -> u64 {
        100
    }
    pub fn expiring_soon_days() -> i64 {
        30
    }
    pub fn event_capacity() -> usize {
        1024
    }
}

/// Runtime settings for the back office, layered from files and environment.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,

    /// Shared HS256 secret of the external token issuer
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "defaults::auth_issuer")]
    pub auth_issuer: String,

    #[serde(default = "defaults::auth_audience")]
    pub auth_audience: String,

    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// `development`, `test`, `production`, ...
    pub environment: String,

    #[serde(default = "defaults::log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit tracing output as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Apply pending migrations at startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma-separated origins; any origin is allowed when unset
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default = "defaults::pool_max")]
    pub db_max_connections: u32,
    #[serde(default = "defaults::pool_min")]
    pub db_min_connections: u32,
    #[serde(default = "defaults::connect_timeout")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "defaults::idle_timeout")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "defaults::acquire_timeout")]
    pub db_acquire_timeout_secs: u64,

    /// Limit for one store call or transaction, in seconds
    #[serde(default = "defaults::store_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub store_timeout_secs: u64,

    #[serde(default = "defaults::page_size")]
    pub api_default_page_size: u64,

    #[serde(default = "defaults::max_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub api_max_page_size: u64,

    /// Warranties with this many days left or fewer report `expiring_soon`
    #[serde(default = "defaults::expiring_soon_days")]
    #[validate(range(min = 0, max = 3650))]
    pub expiring_soon_threshold_days: i64,

    /// Whether a repair can be opened against a deactivated warranty
    #[serde(default)]
    pub allow_service_on_inactive_warranty: bool,

    #[serde(default = "defaults::event_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

impl AppConfig {
    /// Builds a configuration from the required keys, everything else at its
    /// default.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            auth_issuer: defaults::auth_issuer(),
            auth_audience: defaults::auth_audience(),
            host,
            port,
            environment,
            log_level: defaults::log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: defaults::pool_max(),
            db_min_connections: defaults::pool_min(),
            db_connect_timeout_secs: defaults::connect_timeout(),
            db_idle_timeout_secs: defaults::idle_timeout(),
            db_acquire_timeout_secs: defaults::acquire_timeout(),
            store_timeout_secs: defaults::store_timeout(),
            api_default_page_size: defaults::page_size(),
            api_max_page_size: defaults::max_page_size(),
            expiring_soon_threshold_days: defaults::expiring_soon_days(),
            allow_service_on_inactive_warranty: false,
            event_channel_capacity: defaults::event_capacity(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Parsed CORS origins, empty when none are configured
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("could not assemble configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn invalid(field: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(field);
    err.message = Some(message.into());
    err
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(invalid(
            "log_level",
            "expected trace, debug, info, warn or error",
        )),
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    const PLACEHOLDERS: [&str; 3] = ["changeme", "secret", "your-secret-key"];

    let secret = secret.trim();
    if PLACEHOLDERS.iter().any(|p| secret.eq_ignore_ascii_case(p)) {
        return Err(invalid("jwt_secret", "placeholder secrets are not accepted"));
    }

    let mut chars = secret.chars();
    if let Some(first) = chars.next() {
        if chars.all(|c| c == first) {
            return Err(invalid("jwt_secret", "secret is a single repeated character"));
        }
    }

    Ok(())
}

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let directives = env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| format!("backoffice_api={},tower_http=debug", level));
    let builder = fmt().with_env_filter(EnvFilter::new(directives));

    // try_init: tests may install a subscriber first
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Loads configuration from `config/`.
///
/// Later sources override earlier ones: built-in defaults, then
/// `config/default.toml`, then `config/{RUN_ENV}.toml`, then `APP__*`
/// environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| defaults::ENVIRONMENT.to_string());
    info!(environment = %run_env, dir = %config_dir.display(), "loading configuration");

    let layered = Config::builder()
        .set_default("database_url", defaults::DATABASE_URL)?
        .set_default("host", defaults::HOST)?
        .set_default("port", defaults::PORT)?
        .set_default("environment", defaults::ENVIRONMENT)?
        .set_default("log_level", defaults::LOG_LEVEL)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // No default on purpose: the secret belongs to the token issuer.
    if layered.get_string("jwt_secret").is_err() {
        error!("jwt_secret missing; set APP__JWT_SECRET");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret (set APP__JWT_SECRET)".into(),
        )));
    }

    let cfg: AppConfig = layered.try_deserialize()?;
    if let Err(errors) = cfg.validate() {
        error!(?errors, "configuration rejected");
        return Err(errors.into());
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "a_reasonably_long_shared_secret_for_tests_0123456789".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn defaults_pass_validation() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.expiring_soon_threshold_days, 30);
        assert_eq!(cfg.api_max_page_size, 100);
        assert!(!cfg.allow_service_on_inactive_warranty);
    }

    #[test]
    fn short_or_placeholder_secrets_are_rejected() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());

        cfg.jwt_secret = "x".repeat(40);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        assert!(cfg.validate().is_err());

        cfg.log_level = "WARN".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn cors_origins_are_trimmed() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some(" https://a.example , ,https://b.example".into());
        assert_eq!(
            cfg.cors_origins(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn loads_layered_file_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
            database_url = "sqlite::memory:"
            jwt_secret = "file_provided_secret_with_enough_length_0123456789"
            host = "127.0.0.1"
            environment = "test"
            expiring_soon_threshold_days = 14
            allow_service_on_inactive_warranty = true
            "#
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).expect("config loads");
        assert_eq!(cfg.expiring_soon_threshold_days, 14);
        assert!(cfg.allow_service_on_inactive_warranty);
        assert_eq!(cfg.port, defaults::PORT);
    }
}
