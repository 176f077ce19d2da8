//! Sentinel core library.
//!
//! Building blocks for polling sensors:
//! - Flow configuration document (TOML) with review/scoring
//! - Query routing over the Snowflake and S3 backends
//! - SQL template loading
//! - Comparable poll values and the trigger decision

pub mod backends;
pub mod config;
pub mod error;
pub mod router;
pub mod sql;
pub mod value;

pub use config::{ConfigReview, ConfigWarning, FlowConfig};
pub use error::{SensorError, SensorResult};
pub use router::{FlowQuery, QueryRouter, StorageType, ValueSource};
pub use value::{decide, PollValue, TriggerDecision};
