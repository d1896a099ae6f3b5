use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::crypto::default_spool_dir;
use crate::storage::ExistencePolicy;
use crate::types::{AppError, AppResult};

/// Validity window of the presigned PUT URL.
pub const DEFAULT_PRESIGN_SECS: u64 = 5 * 60;

/// Region used for the bucket location lookup.
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub path_style: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub default_bucket: String,
    pub presign_secs: u64,
    pub spool_dir: PathBuf,
    pub existence_policy: ExistencePolicy,
}

impl UploadConfig {
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                region: DEFAULT_REGION.to_string(),
                endpoint: None,
                access_key_id: None,
                secret_access_key: None,
                path_style: false,
            },
            upload: UploadConfig {
                default_bucket: String::new(),
                presign_secs: DEFAULT_PRESIGN_SECS,
                spool_dir: default_spool_dir(),
                existence_policy: ExistencePolicy::Strict,
            },
        }
    }
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            storage: StorageConfig {
                region: var("S3_REGION").unwrap_or(defaults.storage.region),
                endpoint: var("S3_ENDPOINT"),
                access_key_id: var("AWS_ACCESS_KEY_ID"),
                secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
                path_style: match var("S3_PATH_STYLE") {
                    Some(v) => parse_var("S3_PATH_STYLE", &v)?,
                    None => defaults.storage.path_style,
                },
            },
            upload: UploadConfig {
                default_bucket: var("S3_BUCKET").unwrap_or_default(),
                presign_secs: match var("UPLOAD_PRESIGN_SECS") {
                    Some(v) => parse_var("UPLOAD_PRESIGN_SECS", &v)?,
                    None => defaults.upload.presign_secs,
                },
                spool_dir: var("UPLOAD_SPOOL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.upload.spool_dir),
                existence_policy: match var("UPLOAD_EXISTS_POLICY") {
                    Some(v) => v.parse()?,
                    None => defaults.upload.existence_policy,
                },
            },
        })
    }
}

fn parse_var<T>(name: &str, value: &str) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{}='{}': {}", name, value, e)))
}
