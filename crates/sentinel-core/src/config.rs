//! Flow configuration.
//!
//! Supports loading configuration from:
//! 1. A TOML config file (`sentinel.toml` by convention)
//! 2. Environment variables for the runtime endpoints
//!
//! Environment variables take precedence over config file values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{SensorError, SensorResult};

/// Main flow configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Project name, used as the flow identity in the run store.
    pub project_name: String,
    /// Sensor flow configuration.
    pub sensor: SensorConfig,
    /// Data source selection.
    pub data: DataConfig,
    /// Backend-specific keyword arguments.
    pub data_kwargs: DataKwargs,
    /// Runtime endpoints (run store, event bus).
    pub runtime: RuntimeConfig,
}

/// Sensor flow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Cron schedule the deployment tooling registers for the sensor.
    /// Carried in config; not interpreted by this service.
    pub cron_schedule: String,
    /// Event to publish on every cycle. When unset, the run's own
    /// success/failure is the trigger signal.
    pub event_name: Option<String>,
    /// Key under which the polled value is published (default: "value").
    pub payload_key: String,
}

/// Data source selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Storage backend type: "snowflake" or "s3". Kept as a free string
    /// and validated at dispatch so the starter flow can review it.
    #[serde(rename = "type")]
    pub storage_type: String,
    /// Named Snowflake integration; scopes credential lookup.
    pub integration: Option<String>,
    /// IAM role the deployment assumes for S3 access.
    pub role: Option<String>,
}

/// Backend-specific keyword arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataKwargs {
    /// S3 check mode: files_metadata, file_modified_ts, or file_size.
    pub check_mode: Option<String>,
    /// S3 bucket, with or without the s3:// scheme.
    pub bucket: Option<String>,
    /// S3 object key, or listing prefix in files_metadata mode.
    pub key: Option<String>,
    /// Named SQL template under the sql/ directory (snowflake).
    pub template: Option<String>,
    /// Literal SQL, as an alternative to a named template.
    pub sql: Option<String>,
    /// Arguments rendered into the SQL template.
    pub template_args: Option<HashMap<String, serde_json::Value>>,
}

/// Runtime endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Run store server URL (default: "http://localhost:8082").
    pub server_url: String,
    /// NATS server URL (default: "nats://localhost:4222").
    pub nats_url: String,
    /// Directory holding SQL templates (default: "sql").
    pub sql_dir: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            sensor: SensorConfig::default(),
            data: DataConfig::default(),
            data_kwargs: DataKwargs::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            cron_schedule: String::new(),
            event_name: None,
            payload_key: "value".to_string(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            storage_type: String::new(),
            integration: None,
            role: None,
        }
    }
}

impl Default for DataKwargs {
    fn default() -> Self {
        Self {
            check_mode: None,
            bucket: None,
            key: None,
            template: None,
            sql: None,
            template_args: None,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8082".to_string(),
            nats_url: "nats://localhost:4222".to_string(),
            sql_dir: "sql".to_string(),
        }
    }
}

impl FlowConfig {
    /// Load configuration from a file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> SensorResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.check_required()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SensorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SensorError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| SensorError::Config(e.to_string()))
    }

    /// Apply environment variable overrides for runtime endpoints.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SENTINEL_SERVER_URL") {
            self.runtime.server_url = val;
        }
        if let Ok(val) = std::env::var("NATS_URL") {
            self.runtime.nats_url = val;
        }
        if let Ok(val) = std::env::var("SENTINEL_SQL_DIR") {
            self.runtime.sql_dir = val;
        }
    }

    /// Fail on missing required keys. The review below stays informational;
    /// these two are load-time errors because nothing downstream can run
    /// without a flow identity or a schedule to register.
    fn check_required(&self) -> SensorResult<()> {
        if self.project_name.is_empty() {
            return Err(SensorError::Config("project_name is required".to_string()));
        }
        if self.sensor.cron_schedule.is_empty() {
            return Err(SensorError::Config(
                "sensor.cron_schedule is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Event name, treating the empty string as unset.
    pub fn event_name(&self) -> Option<&str> {
        self.sensor
            .event_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }

    /// Review the configuration: collect human-readable warnings with a
    /// cumulative severity score. Warnings inform, they never fail the run.
    pub fn review(&self) -> ConfigReview {
        let mut review = ConfigReview::default();

        if self.event_name().is_none() {
            review.warn(
                1,
                "sensor.event_name is not set; downstream flows will key off run \
                 success instead of a published event",
            );
        }

        let storage_type = self.data.storage_type.as_str();
        if !matches!(storage_type, "snowflake" | "s3") {
            review.warn(
                5,
                format!(
                    "data.type '{}' is not supported; only snowflake and s3 are",
                    storage_type
                ),
            );
        }

        if storage_type == "snowflake" && self.data_kwargs.template.is_none() {
            review.warn(
                3,
                "snowflake sensors need a SQL file under sql/ referenced by \
                 data_kwargs.template",
            );
        }

        if storage_type == "s3" {
            if self.data_kwargs.bucket.is_none() {
                review.warn(3, "s3 sensors need data_kwargs.bucket");
            }
            if self.data_kwargs.key.is_none() {
                review.warn(3, "s3 sensors need data_kwargs.key");
            }
        }

        review
    }
}

/// A single configuration warning with its severity penalty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    /// Human-readable message.
    pub message: String,
    /// Severity penalty contributing to the cumulative score.
    pub penalty: u32,
}

/// Outcome of a configuration review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigReview {
    /// Collected warnings, in the order they were found.
    pub warnings: Vec<ConfigWarning>,
}

impl ConfigReview {
    fn warn(&mut self, penalty: u32, message: impl Into<String>) {
        self.warnings.push(ConfigWarning {
            message: message.into(),
            penalty,
        });
    }

    /// Cumulative severity score.
    pub fn score(&self) -> u32 {
        self.warnings.iter().map(|w| w.penalty).sum()
    }

    /// A score below 5 is acceptable; at or above it, the configuration
    /// is unlikely to produce a working sensor.
    pub fn is_acceptable(&self) -> bool {
        self.score() < 5
    }
}
