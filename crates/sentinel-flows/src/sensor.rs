//! Sensor flow: one change-detection cycle.
//!
//! A cycle is two linear steps. `start` reads the previous run's stored
//! value, polls the backend once, compares, and records the outcome.
//! `end` either publishes the configured event unconditionally, or, with
//! no event configured, turns the decision into the run's own completion
//! signal: finish normally on a change, skip deliberately on none.

use chrono::Utc;
use sentinel_core::{decide, FlowConfig, PollValue, SensorResult, TriggerDecision, ValueSource};

use crate::card::RunCard;
use crate::events::EventSink;
use crate::history::{RunHistory, StoredCycle};

/// How a cycle finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// An event name is configured and the event was published.
    EventPublished {
        /// The published event name.
        event_name: String,
    },
    /// No event name; the value changed, so the run completes normally to
    /// signal anything chained after it.
    Triggered,
    /// No event name and no change; the run is skipped on purpose so
    /// nothing downstream fires. Not an error.
    SkipTrigger,
}

impl CycleOutcome {
    /// Process exit code for this outcome. The deliberate skip gets its
    /// own code so an external orchestrator can tell "ran, no change"
    /// from a genuine failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CycleOutcome::EventPublished { .. } | CycleOutcome::Triggered => 0,
            CycleOutcome::SkipTrigger => 3,
        }
    }
}

/// What one `start` step produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// This run's identifier.
    pub run_id: String,

    /// The value polled this cycle.
    pub value: PollValue,

    /// The previous run's stored value, if one was readable.
    pub previous: Option<PollValue>,

    /// The comparison decision.
    pub decision: TriggerDecision,
}

/// The sensor flow.
pub struct SensorFlow {
    config: FlowConfig,
    source: Box<dyn ValueSource>,
    history: Box<dyn RunHistory>,
    events: Box<dyn EventSink>,
}

impl SensorFlow {
    /// Wire a flow from its configuration and collaborators.
    pub fn new(
        config: FlowConfig,
        source: Box<dyn ValueSource>,
        history: Box<dyn RunHistory>,
        events: Box<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            source,
            history,
            events,
        }
    }

    /// Run one cycle.
    pub async fn run(&self, force: bool) -> SensorResult<CycleOutcome> {
        let report = self.start(force).await?;
        self.end(&report).await
    }

    /// Poll, compare against the previous run, record the outcome.
    async fn start(&self, force: bool) -> SensorResult<CycleReport> {
        let flow = self.config.project_name.as_str();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut card = RunCard::new();

        // Register before the lookup so "skip the newest run" always
        // skips this one.
        self.history.begin_run(flow, &run_id).await?;

        let previous = if force {
            card.append("*Force override is set - ignoring previous value*");
            None
        } else {
            self.previous_value(flow, &mut card).await
        };

        let value = self.source.poll().await?;
        let decision = decide(&value, previous.as_ref());

        match decision {
            TriggerDecision::NoTrigger => {
                card.append(format!("## No changes\n\nThe value is still `{}`", value));
            }
            TriggerDecision::Trigger => {
                let old = previous
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "none".to_string());
                card.append(format!(
                    "## Value changed to `{}`\n\nThe old value was `{}`",
                    value, old
                ));
            }
        }

        tracing::info!(
            flow = %flow,
            run_id = %run_id,
            decision = %decision,
            "Sensor cycle compared"
        );

        let cycle = StoredCycle {
            value: value.clone(),
            decision,
            card: Some(card.render()),
        };
        self.history.record_cycle(&run_id, &cycle).await?;

        Ok(CycleReport {
            run_id,
            value,
            previous,
            decision,
        })
    }

    /// The previous run's stored value. Any failure (no completed run,
    /// nothing recorded, run store unreachable) is the cold-start
    /// condition, not an error.
    async fn previous_value(&self, flow: &str, card: &mut RunCard) -> Option<PollValue> {
        match self.history.previous_cycle(flow).await {
            Ok(Some((summary, cycle))) => {
                let ago = summary
                    .finished_at
                    .map(|finished| {
                        let minutes = (Utc::now() - finished).num_minutes();
                        format!(" from {} minutes ago", minutes)
                    })
                    .unwrap_or_default();
                card.append(format!(
                    "Comparing to previous run **`{}`**{}",
                    summary.run_id, ago
                ));
                Some(cycle.value)
            }
            Ok(None) => {
                card.append("*No previous completed runs found*");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Run history unavailable, treating as cold start");
                card.append("*No previous completed runs found*");
                None
            }
        }
    }

    /// Dispatch the decision.
    async fn end(&self, report: &CycleReport) -> SensorResult<CycleOutcome> {
        if let Some(event_name) = self.config.event_name() {
            // Event mode publishes every cycle; consumers interpret each
            // poll themselves.
            let mut payload = serde_json::Map::new();
            payload.insert(
                self.config.sensor.payload_key.clone(),
                report.value.clone(),
            );
            self.events
                .publish(event_name, serde_json::Value::Object(payload))
                .await?;

            tracing::info!(event_name = %event_name, "Published sensor event");
            return Ok(CycleOutcome::EventPublished {
                event_name: event_name.to_string(),
            });
        }

        if report.decision.is_trigger() {
            tracing::info!("Finishing the run successfully to signal downstream flows");
            Ok(CycleOutcome::Triggered)
        } else {
            tracing::info!("No change detected, skipping downstream trigger on purpose");
            Ok(CycleOutcome::SkipTrigger)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryRunHistory;
    use async_trait::async_trait;
    use sentinel_core::SensorError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FixedSource(PollValue);

    #[async_trait]
    impl ValueSource for FixedSource {
        async fn poll(&self) -> SensorResult<PollValue> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingSink {
        count: AtomicUsize,
        last: Mutex<Option<(String, serde_json::Value)>>,
    }

    #[async_trait]
    impl EventSink for Arc<CountingSink> {
        async fn publish(
            &self,
            event_name: &str,
            payload: serde_json::Value,
        ) -> SensorResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((event_name.to_string(), payload));
            Ok(())
        }
    }

    fn test_config(event_name: Option<&str>) -> FlowConfig {
        let mut config: FlowConfig = toml::from_str(
            r#"
project_name = "watch"

[sensor]
cron_schedule = "*/5 * * * *"

[data]
type = "s3"
"#,
        )
        .unwrap();
        config.sensor.event_name = event_name.map(String::from);
        config
    }

    fn seeded_history(value: Option<PollValue>) -> Arc<MemoryRunHistory> {
        let history = Arc::new(MemoryRunHistory::new());
        if let Some(value) = value {
            history.seed(
                "watch",
                "run-prev",
                StoredCycle {
                    value,
                    decision: TriggerDecision::Trigger,
                    card: None,
                },
            );
        }
        history
    }

    fn flow(
        event_name: Option<&str>,
        current: PollValue,
        history: Arc<MemoryRunHistory>,
        sink: Arc<CountingSink>,
    ) -> SensorFlow {
        SensorFlow::new(
            test_config(event_name),
            Box::new(FixedSource(current)),
            Box::new(history),
            Box::new(sink),
        )
    }

    #[tokio::test]
    async fn test_cold_start_triggers() {
        let history = seeded_history(None);
        let sensor = flow(None, json!(42), history.clone(), Arc::default());

        let outcome = sensor.run(false).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Triggered);
    }

    #[tokio::test]
    async fn test_unchanged_value_skips() {
        let history = seeded_history(Some(json!(42)));
        let sensor = flow(None, json!(42), history.clone(), Arc::default());

        let outcome = sensor.run(false).await.unwrap();
        assert_eq!(outcome, CycleOutcome::SkipTrigger);
    }

    #[tokio::test]
    async fn test_changed_value_triggers() {
        let history = seeded_history(Some(json!(42)));
        let sensor = flow(None, json!(43), history.clone(), Arc::default());

        let outcome = sensor.run(false).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Triggered);
    }

    #[tokio::test]
    async fn test_force_ignores_matching_previous() {
        let history = seeded_history(Some(json!(42)));
        let sensor = flow(None, json!(42), history.clone(), Arc::default());

        let outcome = sensor.run(true).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Triggered);
    }

    #[tokio::test]
    async fn test_cycle_is_recorded_for_the_next_run() {
        let history = seeded_history(None);
        let sensor = flow(None, json!(42), history.clone(), Arc::default());
        sensor.run(false).await.unwrap();

        // A different flow identity sees nothing
        assert!(history.previous_cycle("other").await.unwrap().is_none());

        // The newest completed run now holds this cycle's value
        let runs = history.recent_runs("watch", 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        let stored = history.load_cycle(&runs[0].run_id).await.unwrap().unwrap();
        assert_eq!(stored.value, json!(42));
        assert_eq!(stored.decision, TriggerDecision::Trigger);
        assert!(stored.card.is_some());
    }

    #[tokio::test]
    async fn test_event_mode_publishes_on_change() {
        let sink = Arc::new(CountingSink::default());
        let history = seeded_history(Some(json!(1)));
        let sensor = flow(Some("table_changed"), json!(2), history, sink.clone());

        let outcome = sensor.run(false).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::EventPublished {
                event_name: "table_changed".to_string()
            }
        );
        assert_eq!(sink.count.load(Ordering::SeqCst), 1);

        let (name, payload) = sink.last.lock().unwrap().clone().unwrap();
        assert_eq!(name, "table_changed");
        assert_eq!(payload, json!({"value": 2}));
    }

    #[tokio::test]
    async fn test_event_mode_publishes_without_change_too() {
        let sink = Arc::new(CountingSink::default());
        let history = seeded_history(Some(json!(1)));
        let sensor = flow(Some("table_changed"), json!(1), history, sink.clone());

        let outcome = sensor.run(false).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::EventPublished { .. }));
        assert_eq!(sink.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_payload_key() {
        let sink = Arc::new(CountingSink::default());
        let mut config = test_config(Some("table_changed"));
        config.sensor.payload_key = "row_count".to_string();

        let sensor = SensorFlow::new(
            config,
            Box::new(FixedSource(json!(7))),
            Box::new(seeded_history(None)),
            Box::new(sink.clone()),
        );
        sensor.run(false).await.unwrap();

        let (_, payload) = sink.last.lock().unwrap().clone().unwrap();
        assert_eq!(payload, json!({"row_count": 7}));
    }

    #[tokio::test]
    async fn test_query_failure_aborts_cycle() {
        struct FailingSource;

        #[async_trait]
        impl ValueSource for FailingSource {
            async fn poll(&self) -> SensorResult<PollValue> {
                Err(SensorError::QueryExecution("warehouse offline".to_string()))
            }
        }

        let sensor = SensorFlow::new(
            test_config(None),
            Box::new(FailingSource),
            Box::new(seeded_history(None)),
            Box::new(Arc::new(CountingSink::default())),
        );

        let result = sensor.run(false).await;
        assert!(matches!(result, Err(SensorError::QueryExecution(_))));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CycleOutcome::Triggered.exit_code(), 0);
        assert_eq!(
            CycleOutcome::EventPublished {
                event_name: "e".to_string()
            }
            .exit_code(),
            0
        );
        // The deliberate skip is not a generic failure
        assert_eq!(CycleOutcome::SkipTrigger.exit_code(), 3);
        assert_ne!(CycleOutcome::SkipTrigger.exit_code(), 1);
    }
}
