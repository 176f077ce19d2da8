//! Object store polling backend.
//!
//! Watches an S3 bucket in one of three check modes: a listing of object
//! metadata under a prefix, the last-modified timestamp of one object, or
//! the byte size of one object. A missing object is a null value, not an
//! error, so a comparison against a stored value still decides the cycle.

use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StorePath;
use object_store::ObjectStore;
use std::sync::Arc;

use crate::error::{SensorError, SensorResult};
use crate::value::PollValue;

/// What to watch in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Watch for new files: key, last-modified, and size of every object
    /// under the prefix.
    FilesMetadata,
    /// Watch the last-modified timestamp of one object.
    FileModifiedTs,
    /// Watch the byte size of one object.
    FileSize,
}

impl CheckMode {
    /// Parse a check mode tag. Anything unrecognized is refused.
    pub fn parse(mode: &str) -> SensorResult<Self> {
        match mode {
            "files_metadata" => Ok(CheckMode::FilesMetadata),
            "file_modified_ts" => Ok(CheckMode::FileModifiedTs),
            "file_size" => Ok(CheckMode::FileSize),
            other => Err(SensorError::UnsupportedCheckMode(other.to_string())),
        }
    }
}

/// S3 polling backend.
pub struct S3Backend {
    store: Arc<dyn ObjectStore>,
    /// Prefix inside the bucket that keys are resolved against, taken from
    /// the path portion of the configured bucket URL.
    root: Option<String>,
}

impl S3Backend {
    /// Build a backend for a bucket URL ("s3://name/optional/prefix" or
    /// just "name"). Credentials come from the ambient AWS environment;
    /// the configured role is the deployment's concern and is only logged.
    pub fn from_config(bucket: &str, role: Option<&str>) -> SensorResult<Self> {
        let (bucket_name, root) = split_bucket_url(bucket);

        if let Some(role) = role {
            tracing::debug!(role = %role, bucket = %bucket_name, "Using deployment role for S3 access");
        }

        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket_name)
            .build()
            .map_err(|e| SensorError::Config(format!("Invalid S3 configuration: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            root,
        })
    }

    /// Build a backend over an already-constructed store.
    pub fn with_store(store: Arc<dyn ObjectStore>, root: Option<String>) -> Self {
        Self { store, root }
    }

    /// Run one check in the given mode.
    pub async fn query(&self, mode: CheckMode, key: Option<&str>) -> SensorResult<PollValue> {
        match mode {
            CheckMode::FilesMetadata => self.files_metadata(key).await,
            CheckMode::FileModifiedTs => {
                let meta = self.head(self.require_key(key)?).await?;
                Ok(match meta {
                    Some(meta) => serde_json::json!(meta.last_modified.to_rfc3339()),
                    None => serde_json::Value::Null,
                })
            }
            CheckMode::FileSize => {
                let meta = self.head(self.require_key(key)?).await?;
                Ok(match meta {
                    Some(meta) => serde_json::json!(meta.size),
                    None => serde_json::Value::Null,
                })
            }
        }
    }

    /// List objects under the prefix (the whole root when the key is empty
    /// or "/") and return one metadata record per object. The listing is
    /// taken in the order the store returns it; an unstable order shows up
    /// to the comparison as a change.
    async fn files_metadata(&self, key: Option<&str>) -> SensorResult<PollValue> {
        let prefix = match key {
            None | Some("") | Some("/") => self.root.clone(),
            Some(key) => Some(self.resolve(key)),
        };
        let prefix = prefix.map(StorePath::from);

        let mut listing = self.store.list(prefix.as_ref());
        let mut records = Vec::new();
        while let Some(meta) = listing.try_next().await? {
            records.push(serde_json::json!({
                "key": meta.location.to_string(),
                "last_modified": meta.last_modified.to_rfc3339(),
                "size": meta.size,
            }));
        }

        tracing::debug!(count = records.len(), "Listed objects");
        Ok(serde_json::Value::Array(records))
    }

    /// Head one object; a missing object is None.
    async fn head(&self, key: &str) -> SensorResult<Option<object_store::ObjectMeta>> {
        let location = StorePath::from(self.resolve(key));
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(meta)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn require_key<'a>(&self, key: Option<&'a str>) -> SensorResult<&'a str> {
        match key {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(SensorError::Config(
                "data_kwargs.key is required for single-object check modes".to_string(),
            )),
        }
    }

    fn resolve(&self, key: &str) -> String {
        match &self.root {
            Some(root) => format!("{}/{}", root, key.trim_start_matches('/')),
            None => key.to_string(),
        }
    }
}

/// Split "s3://bucket/optional/prefix" into bucket name and prefix.
fn split_bucket_url(bucket: &str) -> (String, Option<String>) {
    let trimmed = bucket
        .strip_prefix("s3://")
        .unwrap_or(bucket)
        .trim_matches('/');

    match trimmed.split_once('/') {
        Some((name, prefix)) => (name.to_string(), Some(prefix.to_string())),
        None => (trimmed.to_string(), None),
    }
}
