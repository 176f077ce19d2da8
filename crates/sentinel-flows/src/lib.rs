//! Sentinel flows.
//!
//! The two flow entry points and their collaborators:
//! - Sensor flow: one change-detection cycle per invocation
//! - Starter flow: configuration review plus one demonstration query
//! - Run history client, NATS event sink, run card

pub mod card;
pub mod events;
pub mod history;
pub mod sensor;
pub mod starter;

pub use card::RunCard;
pub use events::{EventSink, LogEventSink, NatsEventSink};
pub use history::{HttpRunHistory, MemoryRunHistory, RunHistory, RunSummary, StoredCycle};
pub use sensor::{CycleOutcome, CycleReport, SensorFlow};
pub use starter::StarterFlow;
