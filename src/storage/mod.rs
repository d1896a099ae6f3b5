// Storage layer (S3-compatible)

use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::types::{AppError, AppResult};

pub mod s3_client;

pub use s3_client::*;

/// Answer from a metadata-only lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadResponse {
    /// The object is present; `last_modified` is what the backend reported.
    Found { last_modified: Option<String> },
    /// The backend said there is no such object.
    NotFound,
}

/// The remote operations the upload pipeline relies on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// HEAD-style lookup. Transport failures come back as `Err`.
    async fn head(&self, key: &str) -> AppResult<HeadResponse>;

    /// Time-boxed URL that accepts a single PUT of `key`.
    async fn presign_put(&self, key: &str, expires_in: Duration) -> AppResult<String>;
}

/// What to do when the existence lookup itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistencePolicy {
    /// Abort; only an explicit "not found" counts as absent.
    #[default]
    Strict,
    /// Log and carry on as if the object were absent.
    Permissive,
}

impl FromStr for ExistencePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ExistencePolicy::Strict),
            "permissive" => Ok(ExistencePolicy::Permissive),
            other => Err(AppError::Config(format!(
                "unknown existence policy '{}', expected 'strict' or 'permissive'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ExistencePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExistencePolicy::Strict => write!(f, "strict"),
            ExistencePolicy::Permissive => write!(f, "permissive"),
        }
    }
}

/// Is there already an object at `key`?
///
/// An object exists when the backend reports a last-modified timestamp for
/// it. Single attempt, no caching.
pub async fn exists(store: &dyn ObjectStore, key: &str, policy: ExistencePolicy) -> AppResult<bool> {
    match store.head(key).await {
        Ok(HeadResponse::Found { last_modified }) => Ok(last_modified.is_some()),
        Ok(HeadResponse::NotFound) => Ok(false),
        Err(e) => match policy {
            ExistencePolicy::Strict => Err(e),
            ExistencePolicy::Permissive => {
                warn!(
                    bucket = store.bucket(),
                    key,
                    error = %e,
                    "existence check failed, assuming object is absent"
                );
                Ok(false)
            }
        },
    }
}
