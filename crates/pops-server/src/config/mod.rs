//! Service config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use pops_core::error::{PopsError, Result};

pub use schema::{ModelSection, ServerSection, ServiceConfig, TelemetrySection};

/// Env var naming the config file.
pub const CONFIG_PATH_ENV: &str = "POPS_CONFIG";
/// Config file used when `POPS_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "pops.yaml";
/// Standard OpenTelemetry env var; overrides `telemetry.otlp_endpoint`.
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

pub fn load_from_file(path: &str) -> Result<ServiceConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| PopsError::BadConfig(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServiceConfig> {
    let cfg: ServiceConfig = serde_yaml::from_str(s)
        .map_err(|e| PopsError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the config the binary runs with from `POPS_CONFIG` and
/// `OTEL_EXPORTER_OTLP_ENDPOINT`.
pub fn load_from_env() -> Result<ServiceConfig> {
    let explicit = std::env::var(CONFIG_PATH_ENV).ok();
    let otlp = std::env::var(OTLP_ENDPOINT_ENV).ok();
    load_with(explicit.as_deref(), DEFAULT_CONFIG_PATH, otlp.as_deref())
}

/// An explicit path must exist; the default path is optional and falls back
/// to built-in defaults. A non-blank OTLP endpoint overrides the file.
pub fn load_with(
    explicit_path: Option<&str>,
    default_path: &str,
    otlp_endpoint: Option<&str>,
) -> Result<ServiceConfig> {
    let mut cfg = match explicit_path {
        Some(path) => load_from_file(path)?,
        None if Path::new(default_path).exists() => load_from_file(default_path)?,
        None => ServiceConfig::default(),
    };

    if let Some(endpoint) = otlp_endpoint {
        if !endpoint.trim().is_empty() {
            cfg.telemetry.otlp_endpoint = Some(endpoint.to_string());
        }
    }
    cfg.validate()?;
    Ok(cfg)
}
