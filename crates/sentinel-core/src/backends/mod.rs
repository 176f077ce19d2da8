//! Storage backend implementations.

pub mod s3;
pub mod snowflake;

pub use s3::{CheckMode, S3Backend};
pub use snowflake::{SnowflakeBackend, SnowflakeConnection};
