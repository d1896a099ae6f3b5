//! Command-line flags.
//!
//! `-f` and `-p` are required; clap prints usage and exits non-zero before
//! any pipeline work when either is missing. Everything else overlays the
//! environment-derived [`Config`].

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::pipeline::UploadRequest;
use crate::types::{AppError, AppResult};

/// Effectively unbounded: the largest positive 32-bit value, in KB/s.
pub const DEFAULT_KBPS: u64 = i32::MAX as u64;

/// Encrypt a file to an OpenPGP public key and upload it to S3 at a capped rate.
#[derive(Parser, Debug, Clone)]
#[command(name = "sealed-upload")]
#[command(version)]
#[command(about = "Encrypt a file to an OpenPGP public key and upload it to S3 at a capped rate")]
pub struct Cli {
    /// Bucket name.
    #[arg(short = 'b', long)]
    pub bucket: Option<String>,

    /// Object key name. Defaults to the file's base name.
    #[arg(short = 'k', long)]
    pub key: Option<String>,

    /// File to encrypt and upload.
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub filename: PathBuf,

    /// ASCII-armored public key of the recipient.
    #[arg(short = 'p', long = "pubkey", value_name = "KEYFILE")]
    pub pubkey: PathBuf,

    /// Upload rate cap in kilobytes per second.
    #[arg(long, default_value_t = DEFAULT_KBPS, value_parser = clap::value_parser!(u64).range(1..))]
    pub kbps: u64,

    /// Region for the bucket location lookup (or the fixed region with --endpoint).
    #[arg(long)]
    pub region: Option<String>,

    /// S3-compatible endpoint URL; disables region discovery.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing.
    #[arg(long)]
    pub path_style: bool,

    /// Validity of the presigned upload URL, in seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub presign_secs: Option<u64>,

    /// Directory for the temporary ciphertext file.
    #[arg(long, value_name = "DIR")]
    pub spool_dir: Option<PathBuf>,

    /// Treat a failed existence check as "object absent" instead of aborting.
    #[arg(long)]
    pub assume_absent_on_error: bool,

    /// Enable debug logging.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Suppress all logging output.
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Overlay flags onto `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(region) = &self.region {
            config.storage.region = region.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.storage.endpoint = Some(endpoint.clone());
        }
        if self.path_style {
            config.storage.path_style = true;
        }
        if let Some(secs) = self.presign_secs {
            config.upload.presign_secs = secs;
        }
        if let Some(dir) = &self.spool_dir {
            config.upload.spool_dir = dir.clone();
        }
        if self.assume_absent_on_error {
            config.upload.existence_policy = crate::storage::ExistencePolicy::Permissive;
        }
    }

    /// Build the pipeline input, filling bucket and key from defaults.
    pub fn request(&self, config: &Config) -> AppResult<UploadRequest> {
        let bucket = self
            .bucket
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| config.upload.default_bucket.clone());
        if bucket.is_empty() {
            return Err(AppError::Usage(
                "no bucket given; pass -b or set S3_BUCKET".to_string(),
            ));
        }

        let key = match self.key.clone().filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => self
                .filename
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    AppError::Usage(format!(
                        "cannot derive an object key from '{}'; pass -k",
                        self.filename.display()
                    ))
                })?,
        };

        Ok(UploadRequest {
            bucket,
            key,
            filename: self.filename.clone(),
            recipient_key: self.pubkey.clone(),
            rate_cap_kbps: self.kbps,
        })
    }
}
