use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use pops_core::error::{PopsError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub model: ModelSection,

    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            model: ModelSection::default(),
            telemetry: TelemetrySection::default(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PopsError::BadConfig(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.model.validate()?;
        self.telemetry.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            PopsError::BadConfig(format!("server.listen must be a valid SocketAddr: {e}"))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    /// Backend identifier resolved by the model loader.
    #[serde(default = "default_model_id")]
    pub id: String,

    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            id: default_model_id(),
            load_timeout_ms: default_load_timeout_ms(),
        }
    }
}

impl ModelSection {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PopsError::BadConfig("model.id must not be empty".into()));
        }
        if !(1..=600_000).contains(&self.load_timeout_ms) {
            return Err(PopsError::BadConfig(
                "model.load_timeout_ms must be between 1 and 600000".into(),
            ));
        }
        Ok(())
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OTLP/HTTP traces endpoint. Spans stay local when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }
}

impl TelemetrySection {
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(PopsError::BadConfig(
                "telemetry.service_name must not be empty".into(),
            ));
        }
        if matches!(&self.otlp_endpoint, Some(e) if e.trim().is_empty()) {
            return Err(PopsError::BadConfig(
                "telemetry.otlp_endpoint must not be blank (omit it instead)".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8001".into()
}
fn default_model_id() -> String {
    crate::model::LEXICON_MODEL_ID.into()
}
fn default_load_timeout_ms() -> u64 {
    30_000
}
fn default_service_name() -> String {
    "pops".into()
}
fn default_log_level() -> String {
    "info".into()
}
