//! Comparable poll values and the trigger decision.
//!
//! Every cycle produces exactly one [`PollValue`]: an array of row arrays
//! from the SQL backend, an array of object-metadata records in
//! files_metadata mode, or a scalar (timestamp, size, possibly null) in the
//! single-object modes. JSON value equality covers both the scalar and the
//! structural, order-sensitive cases.

use serde::{Deserialize, Serialize};

/// The single comparable value produced by one query.
pub type PollValue = serde_json::Value;

/// Outcome of comparing the current value against the previous run's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDecision {
    /// Value changed (or no previous value exists).
    Trigger,
    /// Value unchanged.
    NoTrigger,
}

impl TriggerDecision {
    /// Returns true if the decision is to trigger.
    pub fn is_trigger(&self) -> bool {
        matches!(self, TriggerDecision::Trigger)
    }
}

impl std::fmt::Display for TriggerDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerDecision::Trigger => write!(f, "trigger"),
            TriggerDecision::NoTrigger => write!(f, "no_trigger"),
        }
    }
}

/// Decide whether a cycle triggers.
///
/// Pure function of the current value and the previous one. An absent
/// previous value (cold start, unreadable history, or force override)
/// always triggers. A stored JSON null is a present value: a missing
/// object observed two cycles in a row compares equal and does not
/// re-trigger.
pub fn decide(current: &PollValue, prev: Option<&PollValue>) -> TriggerDecision {
    match prev {
        Some(prev) if prev == current => TriggerDecision::NoTrigger,
        _ => TriggerDecision::Trigger,
    }
}
