use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::models::DEFAULT_SOURCE_CODE;
use crate::services::shipments::ShipmentSettings;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_UPDATE_MODE: &str = "rebuild";
const CONFIG_DIR: &str = "config";

/// What happens to existing shipments when an order is edited.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UpdateMode {
    /// Delete and recreate every shipment.
    #[default]
    Rebuild,
    /// Ship only newly added quantity; rebuild when anything was reduced.
    Add,
    /// Keep shipments unless the edit reduced the order, then delete them.
    Nothing,
}

/// Shipment handling for edited orders
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ShipmentsConfig {
    #[serde(default)]
    pub update_mode: UpdateMode,

    /// Source assigned to items that were never shipped before
    #[serde(default = "default_source_code")]
    #[validate(length(min = 1))]
    pub default_source_code: String,
}

impl Default for ShipmentsConfig {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::default(),
            default_source_code: default_source_code(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub shipments: ShipmentsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            shipments: ShipmentsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Runs derive validation on the root and on nested sections.
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()?;
        self.shipments.validate()
    }
}

impl ShipmentSettings for AppConfig {
    fn update_mode(&self) -> UpdateMode {
        self.shipments.update_mode
    }

    fn default_source_code(&self) -> String {
        self.shipments.default_source_code.clone()
    }
}

impl ShipmentSettings for ShipmentsConfig {
    fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    fn default_source_code(&self) -> String {
        self.default_source_code.clone()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_source_code() -> String {
    DEFAULT_SOURCE_CODE.to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("order_edit_inventory={},order_edit_replay={}", level, level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let builder = fmt()
        .with_env_filter(EnvFilter::new(filter_directive))
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Loads application configuration from `./config`.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(CONFIG_DIR)
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (`{dir}/default.toml`)
/// 3. Environment-specific config (`{dir}/{env}.toml`, env from RUN_ENV or APP_ENV)
/// 4. Environment variables (`APP__*`, e.g. `APP__SHIPMENTS__UPDATE_MODE=add`)
pub fn load_config_from(config_dir: impl AsRef<Path>) -> Result<AppConfig, AppConfigError> {
    let config_dir = config_dir.as_ref();
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env.clone())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("shipments.update_mode", DEFAULT_UPDATE_MODE)?
        .set_default("shipments.default_source_code", DEFAULT_SOURCE_CODE)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate_all().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        update_mode = %app_config.shipments.update_mode,
        default_source_code = %app_config.shipments.default_source_code,
        "Configuration loaded successfully"
    );
    Ok(app_config)
}
