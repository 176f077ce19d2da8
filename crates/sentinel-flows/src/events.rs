//! Event publication.
//!
//! Sensor events are published fire-and-forget to NATS JetStream: one
//! subject per event name under a shared prefix, one small JSON payload
//! carrying the polled value. Consumers decide what a publication means;
//! the sensor publishes every cycle when an event name is configured.

use async_nats::jetstream::{self, Context};
use async_trait::async_trait;

use sentinel_core::{SensorError, SensorResult};

/// Subject prefix for sensor events.
pub const SUBJECT_PREFIX: &str = "sentinel.events";

/// Default JetStream stream name.
pub const DEFAULT_STREAM: &str = "sentinel_events";

/// Destination for sensor events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish a named event with the given payload.
    async fn publish(&self, event_name: &str, payload: serde_json::Value) -> SensorResult<()>;
}

/// NATS JetStream event sink.
pub struct NatsEventSink {
    js: Context,
}

impl NatsEventSink {
    /// Connect to NATS and ensure the event stream exists.
    pub async fn connect(nats_url: &str) -> SensorResult<Self> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| SensorError::Publish(format!("NATS connection error: {}", e)))?;

        let js = jetstream::new(client);
        Self::ensure_stream(&js).await?;

        Ok(Self { js })
    }

    /// Ensure the JetStream stream exists.
    async fn ensure_stream(js: &Context) -> SensorResult<()> {
        match js.get_stream(DEFAULT_STREAM).await {
            Ok(_) => {
                tracing::debug!(stream = DEFAULT_STREAM, "Using existing NATS stream");
                Ok(())
            }
            Err(_) => {
                let config = jetstream::stream::Config {
                    name: DEFAULT_STREAM.to_string(),
                    subjects: vec![format!("{}.>", SUBJECT_PREFIX)],
                    max_age: std::time::Duration::from_secs(24 * 3600),
                    storage: jetstream::stream::StorageType::File,
                    ..Default::default()
                };

                js.create_stream(config)
                    .await
                    .map_err(|e| SensorError::Publish(format!("JetStream error: {}", e)))?;

                tracing::info!(stream = DEFAULT_STREAM, "Created NATS stream");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl EventSink for NatsEventSink {
    async fn publish(&self, event_name: &str, payload: serde_json::Value) -> SensorResult<()> {
        let subject = format!("{}.{}", SUBJECT_PREFIX, event_name);
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| SensorError::Publish(format!("Serialization error: {}", e)))?;

        self.js
            .publish(subject.clone(), bytes.into())
            .await
            .map_err(|e| SensorError::Publish(e.to_string()))?
            .await
            .map_err(|e| SensorError::Publish(e.to_string()))?;

        tracing::debug!(subject = %subject, "Published sensor event");
        Ok(())
    }
}

/// Event sink that only logs, for dry runs and flows with no event name.
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn publish(&self, event_name: &str, payload: serde_json::Value) -> SensorResult<()> {
        tracing::info!(
            event_name = %event_name,
            payload = %payload,
            "Dry run - event not published"
        );
        Ok(())
    }
}
