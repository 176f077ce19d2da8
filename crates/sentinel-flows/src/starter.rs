//! Starter flow: configuration review plus one demonstration query.
//!
//! This flow exists to exercise the moving parts before the sensor is
//! scheduled. The review only informs: warnings and a severity score are
//! logged, never turned into a failure.

use sentinel_core::{FlowConfig, PollValue, SensorResult, ValueSource};

/// The starter flow.
pub struct StarterFlow {
    config: FlowConfig,
    source: Box<dyn ValueSource>,
}

impl StarterFlow {
    /// Wire a flow from its configuration and value source.
    pub fn new(config: FlowConfig, source: Box<dyn ValueSource>) -> Self {
        Self { config, source }
    }

    /// Review the configuration and run the query once.
    pub async fn run(&self) -> SensorResult<PollValue> {
        let review = self.config.review();
        for warning in &review.warnings {
            tracing::warn!(penalty = warning.penalty, "{}", warning.message);
        }

        if review.is_acceptable() {
            tracing::info!(score = review.score(), "Configuration looks usable");
        } else {
            tracing::warn!(
                score = review.score(),
                "Configuration is unlikely to produce a working sensor"
            );
        }

        let value = self.source.poll().await?;
        tracing::info!(value = %value, "Query result");

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedSource(PollValue);

    #[async_trait]
    impl ValueSource for FixedSource {
        async fn poll(&self) -> SensorResult<PollValue> {
            Ok(self.0.clone())
        }
    }

    fn config(storage_type: &str) -> FlowConfig {
        let mut config: FlowConfig = toml::from_str(
            r#"
project_name = "watch"

[sensor]
cron_schedule = "*/5 * * * *"
event_name = "changed"

[data]
type = "snowflake"

[data_kwargs]
template = "sensor"
"#,
        )
        .unwrap();
        config.data.storage_type = storage_type.to_string();
        config
    }

    #[tokio::test]
    async fn test_starter_returns_query_result() {
        let flow = StarterFlow::new(config("snowflake"), Box::new(FixedSource(json!([[1]]))));
        let value = flow.run().await.unwrap();
        assert_eq!(value, json!([[1]]));
    }

    #[tokio::test]
    async fn test_bad_review_does_not_fail_the_run() {
        // Unsupported backend scores 5, but the review only informs
        let flow = StarterFlow::new(config("gcs"), Box::new(FixedSource(json!(null))));
        let value = flow.run().await.unwrap();
        assert_eq!(value, json!(null));
    }
}
