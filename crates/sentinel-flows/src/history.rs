//! Run history access.
//!
//! The run store is externally owned; one cycle reads the value stored by
//! the previous run and records its own value and decision on completion.
//! The previous-value lookup skips the newest entry (the in-progress run
//! registers itself at cycle start) and reads the one before it. Any
//! lookup failure collapses to "no previous value", the expected
//! cold-start condition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use sentinel_core::{PollValue, SensorError, SensorResult, TriggerDecision};

/// Summary of one run, as listed by the run store (newest first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: String,

    /// Run status (RUNNING, COMPLETED, FAILED).
    pub status: String,

    /// Completion time, if the run has finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// The stored outcome of one completed cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCycle {
    /// The comparable value this cycle observed.
    pub value: PollValue,

    /// The decision this cycle reached.
    pub decision: TriggerDecision,

    /// Rendered run card markdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
}

/// Read/write access to the externally-owned run history.
#[async_trait]
pub trait RunHistory: Send + Sync {
    /// Register the in-progress run under the flow's identity.
    async fn begin_run(&self, flow: &str, run_id: &str) -> SensorResult<()>;

    /// List recent runs, newest first.
    async fn recent_runs(&self, flow: &str, limit: usize) -> SensorResult<Vec<RunSummary>>;

    /// Read the cycle stored by a run, if any.
    async fn load_cycle(&self, run_id: &str) -> SensorResult<Option<StoredCycle>>;

    /// Record the current cycle's outcome.
    async fn record_cycle(&self, run_id: &str, cycle: &StoredCycle) -> SensorResult<()>;

    /// The previous run's stored cycle: skip the newest entry (the
    /// in-progress run), read the one before it.
    async fn previous_cycle(&self, flow: &str) -> SensorResult<Option<(RunSummary, StoredCycle)>> {
        let runs = self.recent_runs(flow, 2).await?;
        let previous = match runs.into_iter().nth(1) {
            Some(run) => run,
            None => return Ok(None),
        };

        Ok(self
            .load_cycle(&previous.run_id)
            .await?
            .map(|cycle| (previous, cycle)))
    }
}

#[async_trait]
impl<T: RunHistory + ?Sized> RunHistory for std::sync::Arc<T> {
    async fn begin_run(&self, flow: &str, run_id: &str) -> SensorResult<()> {
        (**self).begin_run(flow, run_id).await
    }

    async fn recent_runs(&self, flow: &str, limit: usize) -> SensorResult<Vec<RunSummary>> {
        (**self).recent_runs(flow, limit).await
    }

    async fn load_cycle(&self, run_id: &str) -> SensorResult<Option<StoredCycle>> {
        (**self).load_cycle(run_id).await
    }

    async fn record_cycle(&self, run_id: &str, cycle: &StoredCycle) -> SensorResult<()> {
        (**self).record_cycle(run_id, cycle).await
    }

    async fn previous_cycle(&self, flow: &str) -> SensorResult<Option<(RunSummary, StoredCycle)>> {
        (**self).previous_cycle(flow).await
    }
}

/// HTTP client for a run store API.
#[derive(Clone)]
pub struct HttpRunHistory {
    client: reqwest::Client,
    server_url: String,
}

impl HttpRunHistory {
    /// Create a new run store client.
    pub fn new(server_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RunHistory for HttpRunHistory {
    async fn begin_run(&self, flow: &str, run_id: &str) -> SensorResult<()> {
        let response = self
            .client
            .post(format!("{}/api/flows/{}/runs", self.server_url, flow))
            .json(&serde_json::json!({
                "run_id": run_id,
                "started_at": Utc::now().to_rfc3339(),
            }))
            .send()
            .await
            .map_err(|e| SensorError::History(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SensorError::History(format!(
                "Failed to register run: {}",
                body
            )));
        }

        Ok(())
    }

    async fn recent_runs(&self, flow: &str, limit: usize) -> SensorResult<Vec<RunSummary>> {
        let response = self
            .client
            .get(format!("{}/api/flows/{}/runs", self.server_url, flow))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| SensorError::History(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SensorError::History(format!(
                "Failed to list runs: {}",
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SensorError::History(e.to_string()))
    }

    async fn load_cycle(&self, run_id: &str) -> SensorResult<Option<StoredCycle>> {
        let response = self
            .client
            .get(format!("{}/api/runs/{}/cycle", self.server_url, run_id))
            .send()
            .await
            .map_err(|e| SensorError::History(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SensorError::History(format!(
                "Failed to load cycle: {}",
                body
            )));
        }

        let cycle: StoredCycle = response
            .json()
            .await
            .map_err(|e| SensorError::History(e.to_string()))?;
        Ok(Some(cycle))
    }

    async fn record_cycle(&self, run_id: &str, cycle: &StoredCycle) -> SensorResult<()> {
        let response = self
            .client
            .post(format!("{}/api/runs/{}/cycle", self.server_url, run_id))
            .json(cycle)
            .send()
            .await
            .map_err(|e| SensorError::History(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SensorError::History(format!(
                "Failed to record cycle: {}",
                body
            )));
        }

        Ok(())
    }
}

struct MemoryRun {
    summary: RunSummary,
    cycle: Option<StoredCycle>,
}

/// In-memory run history for tests and dry runs.
#[derive(Default)]
pub struct MemoryRunHistory {
    /// Runs per flow, newest first.
    runs: Mutex<HashMap<String, Vec<MemoryRun>>>,
}

impl MemoryRunHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a completed run, as if a prior cycle had recorded it.
    pub fn seed(&self, flow: &str, run_id: &str, cycle: StoredCycle) {
        let mut runs = self.runs.lock().unwrap();
        runs.entry(flow.to_string()).or_default().insert(
            0,
            MemoryRun {
                summary: RunSummary {
                    run_id: run_id.to_string(),
                    status: "COMPLETED".to_string(),
                    finished_at: Some(Utc::now()),
                },
                cycle: Some(cycle),
            },
        );
    }
}

#[async_trait]
impl RunHistory for MemoryRunHistory {
    async fn begin_run(&self, flow: &str, run_id: &str) -> SensorResult<()> {
        let mut runs = self.runs.lock().unwrap();
        runs.entry(flow.to_string()).or_default().insert(
            0,
            MemoryRun {
                summary: RunSummary {
                    run_id: run_id.to_string(),
                    status: "RUNNING".to_string(),
                    finished_at: None,
                },
                cycle: None,
            },
        );
        Ok(())
    }

    async fn recent_runs(&self, flow: &str, limit: usize) -> SensorResult<Vec<RunSummary>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs
            .get(flow)
            .map(|entries| {
                entries
                    .iter()
                    .take(limit)
                    .map(|r| r.summary.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn load_cycle(&self, run_id: &str) -> SensorResult<Option<StoredCycle>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs
            .values()
            .flatten()
            .find(|r| r.summary.run_id == run_id)
            .and_then(|r| r.cycle.clone()))
    }

    async fn record_cycle(&self, run_id: &str, cycle: &StoredCycle) -> SensorResult<()> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .values_mut()
            .flatten()
            .find(|r| r.summary.run_id == run_id)
            .ok_or_else(|| SensorError::History(format!("Unknown run: {}", run_id)))?;

        run.cycle = Some(cycle.clone());
        run.summary.status = "COMPLETED".to_string();
        run.summary.finished_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cycle(value: serde_json::Value) -> StoredCycle {
        StoredCycle {
            value,
            decision: TriggerDecision::Trigger,
            card: None,
        }
    }

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let client = HttpRunHistory::new("http://localhost:8082/");
        assert_eq!(client.server_url, "http://localhost:8082");
    }

    #[test]
    fn test_stored_cycle_serialization() {
        let stored = cycle(json!(1024));
        let encoded = serde_json::to_string(&stored).unwrap();
        assert!(encoded.contains("\"decision\":\"trigger\""));
        assert!(encoded.contains("1024"));
        // card is skipped when None
        assert!(!encoded.contains("card"));
    }

    #[tokio::test]
    async fn test_previous_cycle_skips_in_progress_run() {
        let history = MemoryRunHistory::new();
        history.seed("watch", "run-old", cycle(json!(1)));
        history.seed("watch", "run-prev", cycle(json!(2)));
        history.begin_run("watch", "run-now").await.unwrap();

        let (summary, stored) = history.previous_cycle("watch").await.unwrap().unwrap();
        assert_eq!(summary.run_id, "run-prev");
        assert_eq!(stored.value, json!(2));
    }

    #[tokio::test]
    async fn test_previous_cycle_cold_start() {
        let history = MemoryRunHistory::new();
        history.begin_run("watch", "run-now").await.unwrap();

        assert!(history.previous_cycle("watch").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_previous_cycle_unrecorded_previous_run() {
        let history = MemoryRunHistory::new();
        // A previous run that registered but never recorded a cycle
        history.begin_run("watch", "run-prev").await.unwrap();
        history.begin_run("watch", "run-now").await.unwrap();

        assert!(history.previous_cycle("watch").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_and_load_cycle() {
        let history = MemoryRunHistory::new();
        history.begin_run("watch", "run-1").await.unwrap();
        history
            .record_cycle("run-1", &cycle(json!("2024-01-01T00:00:00Z")))
            .await
            .unwrap();

        let stored = history.load_cycle("run-1").await.unwrap().unwrap();
        assert_eq!(stored.value, json!("2024-01-01T00:00:00Z"));

        let runs = history.recent_runs("watch", 10).await.unwrap();
        assert_eq!(runs[0].status, "COMPLETED");
        assert!(runs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_record_cycle_unknown_run() {
        let history = MemoryRunHistory::new();
        let result = history.record_cycle("nope", &cycle(json!(1))).await;
        assert!(matches!(result, Err(SensorError::History(_))));
    }
}
