//! Query routing across storage backends.
//!
//! One query per sensor cycle: the configured storage-type tag selects
//! exactly one backend, and the backend's comparable value flows back to
//! the caller unchanged.

use async_trait::async_trait;

use crate::backends::{CheckMode, S3Backend, SnowflakeBackend, SnowflakeConnection};
use crate::config::{DataConfig, DataKwargs, FlowConfig};
use crate::error::{SensorError, SensorResult};
use crate::sql::SqlTemplates;
use crate::value::PollValue;

/// SQL template used when the configuration names none.
const DEFAULT_TEMPLATE: &str = "sensor";

/// Supported storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Snowflake,
    S3,
}

impl StorageType {
    /// Parse a storage-type tag. Anything unrecognized is refused.
    pub fn parse(storage_type: &str) -> SensorResult<Self> {
        match storage_type {
            "snowflake" => Ok(StorageType::Snowflake),
            "s3" => Ok(StorageType::S3),
            other => Err(SensorError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Dispatches one query to the backend selected by configuration.
pub struct QueryRouter {
    templates: SqlTemplates,
}

impl QueryRouter {
    /// Create a router loading SQL templates from the given directory.
    pub fn new(sql_dir: &str) -> Self {
        Self {
            templates: SqlTemplates::new(sql_dir),
        }
    }

    /// Execute one query against the selected backend.
    pub async fn query(
        &self,
        storage_type: &str,
        data: &DataConfig,
        kwargs: &DataKwargs,
    ) -> SensorResult<PollValue> {
        match StorageType::parse(storage_type)? {
            StorageType::Snowflake => self.query_snowflake(data, kwargs).await,
            StorageType::S3 => self.query_s3(data, kwargs).await,
        }
    }

    async fn query_snowflake(
        &self,
        data: &DataConfig,
        kwargs: &DataKwargs,
    ) -> SensorResult<PollValue> {
        let sql = self.resolve_sql(kwargs)?;

        tracing::debug!(
            integration = data.integration.as_deref().unwrap_or("default"),
            "Executing Snowflake sensor query"
        );

        let connection = SnowflakeConnection::from_env(data.integration.as_deref())?;
        SnowflakeBackend::new(connection).query(&sql).await
    }

    /// Resolve the SQL text for a snowflake query: a literal statement
    /// when one is given, otherwise the named template (default "sensor"),
    /// either one rendered with any template arguments.
    fn resolve_sql(&self, kwargs: &DataKwargs) -> SensorResult<String> {
        if let Some(sql) = &kwargs.sql {
            return match kwargs.template_args.as_ref() {
                Some(args) if !args.is_empty() => self.templates.render_str(sql, args),
                _ => Ok(sql.clone()),
            };
        }

        let name = kwargs.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        self.templates.render(name, kwargs.template_args.as_ref())
    }

    async fn query_s3(&self, data: &DataConfig, kwargs: &DataKwargs) -> SensorResult<PollValue> {
        let mode = CheckMode::parse(kwargs.check_mode.as_deref().ok_or_else(|| {
            SensorError::Config("data_kwargs.check_mode is required for s3".to_string())
        })?)?;

        let bucket = kwargs.bucket.as_deref().ok_or_else(|| {
            SensorError::Config("data_kwargs.bucket is required for s3".to_string())
        })?;

        let backend = S3Backend::from_config(bucket, data.role.as_deref())?;
        backend.query(mode, kwargs.key.as_deref()).await
    }
}

/// Source of the cycle's comparable value.
///
/// The sensor flow polls through this seam so tests can substitute a
/// fixed value for a live backend.
#[async_trait]
pub trait ValueSource: Send + Sync {
    /// Produce this cycle's comparable value.
    async fn poll(&self) -> SensorResult<PollValue>;
}

/// A [`ValueSource`] bound to one flow configuration.
pub struct FlowQuery {
    config: FlowConfig,
    router: QueryRouter,
}

impl FlowQuery {
    /// Bind a router to the flow configuration.
    pub fn new(config: FlowConfig) -> Self {
        let router = QueryRouter::new(&config.runtime.sql_dir);
        Self { config, router }
    }
}

#[async_trait]
impl ValueSource for FlowQuery {
    async fn poll(&self) -> SensorResult<PollValue> {
        self.router
            .query(
                &self.config.data.storage_type,
                &self.config.data,
                &self.config.data_kwargs,
            )
            .await
    }
}
