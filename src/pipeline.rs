//! Upload pipeline
//!
//! check existence -> encrypt to spool -> paced PUT -> report -> cleanup
//!
//! Stages run strictly one after another. The spooled ciphertext is owned by
//! this function from the moment it exists, so it is removed on every exit
//! path: normal return, error, or panic.

use std::path::PathBuf;

use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::config::{Config, UploadConfig};
use crate::crypto;
use crate::storage::{exists, ObjectStore, S3Client};
use crate::transfer::put_presigned;
use crate::types::{AppError, AppResult, TransferDescriptor, UploadOutcome};

/// One invocation's worth of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub bucket: String,
    pub key: String,
    pub filename: PathBuf,
    pub recipient_key: PathBuf,
    pub rate_cap_kbps: u64,
}

impl UploadRequest {
    /// Rate cap converted to bytes per second; zero is rejected.
    pub fn bytes_per_second(&self) -> AppResult<u64> {
        if self.rate_cap_kbps == 0 {
            return Err(AppError::Usage(
                "rate cap must be at least 1 KB/s".to_string(),
            ));
        }
        Ok(self.rate_cap_kbps.saturating_mul(1024))
    }
}

pub struct UploadPipeline<S> {
    store: S,
    http: Client,
    config: UploadConfig,
}

impl<S: ObjectStore> UploadPipeline<S> {
    pub fn new(store: S, config: UploadConfig) -> Self {
        Self {
            store,
            http: Client::new(),
            config,
        }
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn run(&self, request: &UploadRequest) -> AppResult<UploadOutcome> {
        if request.bucket != self.store.bucket() {
            return Err(AppError::Usage(format!(
                "request targets bucket '{}' but the store is bound to '{}'",
                request.bucket,
                self.store.bucket()
            )));
        }
        let bytes_per_second = request.bytes_per_second()?;
        let file = request.filename.display();

        if exists(&self.store, &request.key, self.config.existence_policy).await? {
            info!(
                "skipped uploading file {} to {}/{}",
                file, request.bucket, request.key
            );
            return Ok(UploadOutcome::Skipped);
        }

        let artifact = {
            let filename = request.filename.clone();
            let recipient_key = request.recipient_key.clone();
            let spool_dir = self.config.spool_dir.clone();
            tokio::task::spawn_blocking(move || {
                crypto::encrypt(&filename, &recipient_key, &spool_dir)
            })
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e)))??
        };

        let descriptor = TransferDescriptor {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            content_length: artifact.len()?,
            bytes_per_second,
        };
        debug!(
            spool = %artifact.path().display(),
            content_length = descriptor.content_length,
            "ciphertext ready"
        );

        let url = self
            .store
            .presign_put(&request.key, self.config.presign_ttl())
            .await?;
        let response = put_presigned(&self.http, &url, &artifact, &descriptor).await?;

        let outcome = if response.status.is_success() {
            UploadOutcome::Uploaded {
                bytes: descriptor.content_length,
                elapsed: response.elapsed,
            }
        } else {
            UploadOutcome::Failed {
                status: response.status.as_u16(),
            }
        };

        match &outcome {
            UploadOutcome::Uploaded { .. } => info!(
                "successfully uploaded file {} to {}/{} ({:.2} KB/s)",
                file,
                request.bucket,
                request.key,
                outcome.kbps().unwrap_or_default()
            ),
            UploadOutcome::Failed { status } => error!(
                "failed uploading file {} to {}/{}: HTTP {}",
                file, request.bucket, request.key, status
            ),
            UploadOutcome::Skipped => {}
        }

        if let Err(e) = artifact.close() {
            warn!(error = %e, "failed to remove spooled ciphertext");
        }

        Ok(outcome)
    }
}

/// Resolve the bucket's region, then run the pipeline against it.
pub async fn run(config: &Config, request: &UploadRequest) -> AppResult<UploadOutcome> {
    let store = S3Client::connect(&config.storage, &request.bucket).await?;
    UploadPipeline::new(store, config.upload.clone())
        .run(request)
        .await
}
