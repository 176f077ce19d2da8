//! Snowflake query execution backend.
//!
//! Executes queries through the Snowflake SQL REST API.
//! See: https://docs.snowflake.com/en/developer-guide/sql-api/

use reqwest::Client;
use serde::Deserialize;

use crate::error::{SensorError, SensorResult};
use crate::value::PollValue;

/// Connection settings for one Snowflake integration.
///
/// Resolved from the environment, scoped by integration name:
/// `SNOWFLAKE_<INTEGRATION>_ACCOUNT` falls back to `SNOWFLAKE_ACCOUNT`,
/// and likewise for the other variables.
#[derive(Debug, Clone)]
pub struct SnowflakeConnection {
    /// Account identifier (e.g., "myaccount" or "myaccount.us-east-1").
    pub account: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Warehouse name.
    pub warehouse: String,

    /// Database name.
    pub database: Option<String>,

    /// Schema name.
    pub schema: String,

    /// User role.
    pub role: Option<String>,
}

fn scoped_var(integration: Option<&str>, suffix: &str) -> Option<String> {
    if let Some(integration) = integration {
        let scoped = format!(
            "SNOWFLAKE_{}_{}",
            integration.to_uppercase().replace('-', "_"),
            suffix
        );
        if let Ok(val) = std::env::var(&scoped) {
            return Some(val);
        }
    }
    std::env::var(format!("SNOWFLAKE_{}", suffix)).ok()
}

impl SnowflakeConnection {
    /// Resolve connection settings from the environment.
    pub fn from_env(integration: Option<&str>) -> SensorResult<Self> {
        let require = |suffix: &str| {
            scoped_var(integration, suffix).ok_or_else(|| {
                SensorError::Config(format!(
                    "SNOWFLAKE_{} is not set (integration: {})",
                    suffix,
                    integration.unwrap_or("default")
                ))
            })
        };

        Ok(Self {
            account: require("ACCOUNT")?,
            user: require("USER")?,
            password: require("PASSWORD")?,
            warehouse: scoped_var(integration, "WAREHOUSE")
                .unwrap_or_else(|| "COMPUTE_WH".to_string()),
            database: scoped_var(integration, "DATABASE"),
            schema: scoped_var(integration, "SCHEMA").unwrap_or_else(|| "PUBLIC".to_string()),
            role: scoped_var(integration, "ROLE"),
        })
    }

    /// Account URL for the REST endpoints.
    fn account_url(&self) -> String {
        format!("https://{}.snowflakecomputing.com", self.account)
    }
}

/// Snowflake SQL API response.
#[derive(Debug, Deserialize)]
struct SnowflakeResponse {
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
    #[serde(rename = "resultSetMetaData")]
    result_set_meta_data: Option<ResultSetMetaData>,
}

#[derive(Debug, Deserialize)]
struct ResultSetMetaData {
    #[serde(rename = "numRows")]
    num_rows: Option<i64>,
}

/// Snowflake login response.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: Option<LoginData>,
    message: Option<String>,
    success: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: Option<String>,
}

/// Snowflake query backend.
pub struct SnowflakeBackend {
    http_client: Client,
    connection: SnowflakeConnection,
}

impl SnowflakeBackend {
    /// Create a backend for one connection.
    pub fn new(connection: SnowflakeConnection) -> Self {
        Self {
            http_client: Client::new(),
            connection,
        }
    }

    /// Execute one SQL statement and return the full result set as an
    /// array of row arrays. Execution failures surface immediately; there
    /// are no retries here.
    pub async fn query(&self, sql: &str) -> SensorResult<PollValue> {
        let start = std::time::Instant::now();

        let token = self.authenticate().await?;

        // Session setup (ignore errors; the statement itself will fail
        // meaningfully if the context is wrong)
        for setup in self.setup_statements() {
            let _ = self.execute_statement(&token, &setup).await;
        }

        let response = self.execute_statement(&token, sql).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let row_count = response
            .result_set_meta_data
            .as_ref()
            .and_then(|m| m.num_rows)
            .unwrap_or(response.data.len() as i64);

        tracing::info!(
            account = %self.connection.account,
            warehouse = %self.connection.warehouse,
            row_count,
            duration_ms,
            "Snowflake query finished"
        );

        Ok(serde_json::json!(response.data))
    }

    fn setup_statements(&self) -> Vec<String> {
        let mut statements = vec![format!("USE WAREHOUSE {}", self.connection.warehouse)];
        if let Some(ref db) = self.connection.database {
            statements.push(format!("USE DATABASE {}", db));
        }
        statements.push(format!("USE SCHEMA {}", self.connection.schema));
        if let Some(ref role) = self.connection.role {
            statements.push(format!("USE ROLE {}", role));
        }
        statements
    }

    /// Authenticate and get a session token.
    async fn authenticate(&self) -> SensorResult<String> {
        let login_url = format!("{}/session/v1/login-request", self.connection.account_url());

        let login_body = serde_json::json!({
            "data": {
                "LOGIN_NAME": self.connection.user,
                "PASSWORD": self.connection.password,
                "ACCOUNT_NAME": self.connection.account,
            }
        });

        let response = self
            .http_client
            .post(&login_url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&login_body)
            .send()
            .await
            .map_err(|e| SensorError::Http(format!("Snowflake login request failed: {}", e)))?;

        let login_response: LoginResponse = response.json().await.map_err(|e| {
            SensorError::Http(format!("Failed to parse Snowflake login response: {}", e))
        })?;

        if login_response.success != Some(true) {
            return Err(SensorError::Auth(
                login_response
                    .message
                    .unwrap_or_else(|| "Unknown authentication error".to_string()),
            ));
        }

        login_response
            .data
            .and_then(|d| d.token)
            .ok_or_else(|| SensorError::Auth("No token in login response".to_string()))
    }

    /// Execute a single SQL statement.
    async fn execute_statement(
        &self,
        token: &str,
        statement: &str,
    ) -> SensorResult<SnowflakeResponse> {
        let sql_url = format!("{}/api/v2/statements", self.connection.account_url());

        let body = serde_json::json!({
            "statement": statement,
            "timeout": 60,
            "resultSetMetaData": {
                "format": "jsonv2"
            }
        });

        let response = self
            .http_client
            .post(&sql_url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("Authorization", format!("Snowflake Token=\"{}\"", token))
            .json(&body)
            .send()
            .await
            .map_err(|e| SensorError::Http(format!("Snowflake statement failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SensorError::QueryExecution(format!(
                "Snowflake query failed with status {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            SensorError::Http(format!("Failed to parse Snowflake response: {}", e))
        })
    }
}
