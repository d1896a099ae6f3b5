#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sealed_upload::config::UploadConfig;
use sealed_upload::storage::{ExistencePolicy, HeadResponse, ObjectStore};
use sealed_upload::{AppError, AppResult};

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn upload_config(spool_dir: &Path, policy: ExistencePolicy) -> UploadConfig {
    UploadConfig {
        default_bucket: String::new(),
        presign_secs: 300,
        spool_dir: spool_dir.to_path_buf(),
        existence_policy: policy,
    }
}

pub fn spool_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

/// How the fake backend answers HEAD.
#[derive(Debug, Clone, Copy)]
pub enum Head {
    Present,
    Absent,
    Unreachable,
}

/// In-memory stand-in for the storage backend.
pub struct MockStore {
    pub bucket: String,
    pub head: Head,
    pub put_base: String,
    pub presign_fails: bool,
    pub head_calls: AtomicUsize,
    pub presign_calls: AtomicUsize,
}

impl MockStore {
    pub fn new(bucket: &str, head: Head, put_base: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            head,
            put_base: put_base.to_string(),
            presign_fails: false,
            head_calls: AtomicUsize::new(0),
            presign_calls: AtomicUsize::new(0),
        }
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn presign_calls(&self) -> usize {
        self.presign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head(&self, _key: &str) -> AppResult<HeadResponse> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        match self.head {
            Head::Present => Ok(HeadResponse::Found {
                last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
            }),
            Head::Absent => Ok(HeadResponse::NotFound),
            Head::Unreachable => Err(AppError::Storage("connection reset".to_string())),
        }
    }

    async fn presign_put(&self, key: &str, expires_in: Duration) -> AppResult<String> {
        self.presign_calls.fetch_add(1, Ordering::SeqCst);
        if self.presign_fails {
            return Err(AppError::Storage("signing key unavailable".to_string()));
        }
        Ok(format!(
            "{}/{}/{}?X-Amz-Expires={}&X-Amz-Signature=test",
            self.put_base,
            self.bucket,
            key,
            expires_in.as_secs()
        ))
    }
}
