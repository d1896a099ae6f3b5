// S3 client over rust-s3
//
// Endpoints are region-specific and the bucket's region is not known up
// front, so connecting is two-step: ask a bootstrap region where the bucket
// lives, then rebuild the handle against that region.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use std::time::Duration;
use tracing::{debug, info};

use super::{HeadResponse, ObjectStore};
use crate::config::StorageConfig;
use crate::types::{AppError, AppResult};

pub struct S3Client {
    bucket: Box<Bucket>,
}

impl S3Client {
    /// Resolve the bucket's region and return a handle bound to it.
    ///
    /// With a custom endpoint the bootstrap region is used as-is;
    /// S3-compatible servers rarely implement GetBucketLocation.
    pub async fn connect(config: &StorageConfig, bucket: &str) -> AppResult<Self> {
        let credentials = credentials(config)?;
        let bootstrap = bootstrap_region(config)?;

        let region = if config.endpoint.is_some() {
            bootstrap
        } else {
            discover_region(bucket, bootstrap, credentials.clone()).await?
        };

        info!(bucket, region = %region, "resolved bucket region");

        let handle = open_bucket(bucket, region, credentials, config.path_style)
            .map_err(|e| AppError::RegionResolution(format!("bucket {}: {}", bucket, e)))?;

        Ok(Self { bucket: handle })
    }
}

fn credentials(config: &StorageConfig) -> AppResult<Credentials> {
    Credentials::new(
        config.access_key_id.as_deref(),
        config.secret_access_key.as_deref(),
        None,
        None,
        None,
    )
    .map_err(|e| AppError::Config(format!("failed to load AWS credentials: {}", e)))
}

fn bootstrap_region(config: &StorageConfig) -> AppResult<Region> {
    match &config.endpoint {
        Some(endpoint) => Ok(Region::Custom {
            region: config.region.clone(),
            endpoint: endpoint.clone(),
        }),
        None => config
            .region
            .parse::<Region>()
            .map_err(|e| AppError::Config(format!("invalid region '{}': {}", config.region, e))),
    }
}

fn open_bucket(
    name: &str,
    region: Region,
    credentials: Credentials,
    path_style: bool,
) -> Result<Box<Bucket>, S3Error> {
    let bucket: Box<Bucket> = Bucket::new(name, region, credentials)?.into();
    if path_style {
        Ok(bucket.with_path_style().into())
    } else {
        Ok(bucket)
    }
}

async fn discover_region(
    bucket: &str,
    bootstrap: Region,
    credentials: Credentials,
) -> AppResult<Region> {
    let probe = open_bucket(bucket, bootstrap, credentials, false)
        .map_err(|e| AppError::RegionResolution(format!("bucket {}: {}", bucket, e)))?;

    let (region, status) = probe
        .location()
        .await
        .map_err(|e| AppError::RegionResolution(format!("bucket {}: {}", bucket, e)))?;

    debug!(bucket, status, region = %region, "bucket location lookup");
    Ok(region)
}

#[async_trait]
impl ObjectStore for S3Client {
    fn bucket(&self) -> &str {
        &self.bucket.name
    }

    async fn head(&self, key: &str) -> AppResult<HeadResponse> {
        match self.bucket.head_object(key).await {
            Ok((_, 404)) => Ok(HeadResponse::NotFound),
            Ok((head, status)) if (200..300).contains(&status) => Ok(HeadResponse::Found {
                last_modified: head.last_modified,
            }),
            Ok((_, status)) => Err(AppError::Storage(format!(
                "HEAD {}/{} returned HTTP {}",
                self.bucket.name, key, status
            ))),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(HeadResponse::NotFound),
            Err(e) => Err(AppError::Storage(format!(
                "HEAD {}/{} failed: {}",
                self.bucket.name, key, e
            ))),
        }
    }

    async fn presign_put(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        let expiry_secs = u32::try_from(expires_in.as_secs()).unwrap_or(u32::MAX);
        self.bucket
            .presign_put(key, expiry_secs, None)
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "failed to presign PUT for {}/{}: {}",
                    self.bucket.name, key, e
                ))
            })
    }
}
