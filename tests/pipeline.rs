mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockito::Matcher;
use sealed_upload::storage::ExistencePolicy;
use sealed_upload::{AppError, UploadOutcome, UploadPipeline, UploadRequest};
use tempfile::TempDir;

use common::{fixture, spool_entries, upload_config, Head, MockStore};

const FAST_KBPS: u64 = 1024 * 1024;

fn plaintext(dir: &TempDir, len: usize) -> PathBuf {
    let path = dir.path().join("plain.txt");
    let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

fn request(filename: PathBuf, kbps: u64) -> UploadRequest {
    UploadRequest {
        bucket: "b".to_string(),
        key: "k".to_string(),
        filename,
        recipient_key: fixture("recipient.pub.asc"),
        rate_cap_kbps: kbps,
    }
}

#[tokio::test]
async fn test_uploads_at_capped_rate() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let mut server = mockito::Server::new_async().await;
    // (declared Content-Length, bytes actually received)
    let seen: Arc<Mutex<Option<(u64, usize)>>> = Arc::default();
    let record = Arc::clone(&seen);
    let put = server
        .mock("PUT", Matcher::Regex("^/b/k".to_string()))
        .match_request(move |req| {
            let declared = req
                .header("content-length")
                .first()
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            match (declared, req.body()) {
                (Some(declared), Ok(body)) => {
                    *record.lock().unwrap() = Some((declared, body.len()));
                    true
                }
                _ => false,
            }
        })
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let store = MockStore::new("b", Head::Absent, &server.url());
    let pipeline = UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Strict));

    let outcome = pipeline
        .run(&request(plaintext(&work, 10_000), 10))
        .await
        .unwrap();

    put.assert_async().await;
    let recorded = *seen.lock().unwrap();
    let (declared, received) = recorded.expect("PUT was recorded");
    assert_eq!(declared, received as u64, "Content-Length disagrees with the body");
    match outcome {
        UploadOutcome::Uploaded { bytes, elapsed } => {
            assert_eq!(bytes, declared);
            assert!(bytes >= 10_000, "ciphertext is only {bytes} bytes");
            assert!(elapsed >= Duration::from_secs(1), "body took {elapsed:?}");
        }
        other => panic!("expected upload, got {other:?}"),
    }
    let kbps = outcome.kbps().unwrap();
    assert!(kbps <= 10.5, "achieved {kbps} KB/s");

    assert_eq!(pipeline.store().presign_calls(), 1);
    assert_eq!(spool_entries(spool.path()), 0, "spooled ciphertext left behind");
}

#[tokio::test]
async fn test_existing_object_is_skipped() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let mut server = mockito::Server::new_async().await;
    let put = server
        .mock("PUT", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let store = MockStore::new("b", Head::Present, &server.url());
    let pipeline = UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Strict));

    let outcome = pipeline
        .run(&request(plaintext(&work, 10_000), 10))
        .await
        .unwrap();

    assert_eq!(outcome, UploadOutcome::Skipped);
    put.assert_async().await;
    assert_eq!(pipeline.store().head_calls(), 1);
    assert_eq!(pipeline.store().presign_calls(), 0);
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_skip_does_not_touch_plaintext_or_key() {
    let spool = TempDir::new().unwrap();
    let store = MockStore::new("b", Head::Present, "http://127.0.0.1:9");
    let pipeline = UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Strict));

    let mut req = request(PathBuf::from("/nonexistent/plain.txt"), 10);
    req.recipient_key = PathBuf::from("/nonexistent/key.asc");

    assert_eq!(pipeline.run(&req).await.unwrap(), UploadOutcome::Skipped);
}

#[tokio::test]
async fn test_rejected_put_is_reported_not_raised() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let mut server = mockito::Server::new_async().await;
    let put = server
        .mock("PUT", Matcher::Regex("^/b/k".to_string()))
        .with_status(403)
        .expect(1)
        .create_async()
        .await;

    let store = MockStore::new("b", Head::Absent, &server.url());
    let pipeline = UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Strict));

    let outcome = pipeline
        .run(&request(plaintext(&work, 512), FAST_KBPS))
        .await
        .unwrap();

    put.assert_async().await;
    assert_eq!(outcome, UploadOutcome::Failed { status: 403 });
    assert!(!outcome.is_success());
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_strict_policy_aborts_on_unreachable_backend() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let store = MockStore::new("b", Head::Unreachable, "http://127.0.0.1:9");
    let pipeline = UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Strict));

    let err = pipeline
        .run(&request(plaintext(&work, 512), FAST_KBPS))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Storage(_)), "got {err:?}");
    assert_eq!(pipeline.store().presign_calls(), 0);
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_permissive_policy_uploads_anyway() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let mut server = mockito::Server::new_async().await;
    let put = server
        .mock("PUT", Matcher::Regex("^/b/k".to_string()))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let store = MockStore::new("b", Head::Unreachable, &server.url());
    let pipeline =
        UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Permissive));

    let outcome = pipeline
        .run(&request(plaintext(&work, 512), FAST_KBPS))
        .await
        .unwrap();

    put.assert_async().await;
    assert!(matches!(outcome, UploadOutcome::Uploaded { .. }));
}

#[tokio::test]
async fn test_presign_failure_cleans_up_spool() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let mut store = MockStore::new("b", Head::Absent, "http://127.0.0.1:9");
    store.presign_fails = true;
    let pipeline = UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Strict));

    let err = pipeline
        .run(&request(plaintext(&work, 512), FAST_KBPS))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Storage(_)));
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_unusable_key_is_fatal() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let store = MockStore::new("b", Head::Absent, "http://127.0.0.1:9");
    let pipeline = UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Strict));

    let mut req = request(plaintext(&work, 512), FAST_KBPS);
    req.recipient_key = fixture("sign_only.pub.asc");

    let err = pipeline.run(&req).await.unwrap_err();
    assert!(matches!(err, AppError::KeyParse(_)), "got {err:?}");
    assert_eq!(pipeline.store().presign_calls(), 0);
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_zero_rate_is_rejected_before_any_io() {
    let spool = TempDir::new().unwrap();
    let store = MockStore::new("b", Head::Absent, "http://127.0.0.1:9");
    let pipeline = UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Strict));

    let err = pipeline
        .run(&request(PathBuf::from("plain.txt"), 0))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Usage(_)));
    assert_eq!(pipeline.store().head_calls(), 0);
}

#[tokio::test]
async fn test_bucket_mismatch_is_rejected() {
    let spool = TempDir::new().unwrap();
    let store = MockStore::new("other", Head::Absent, "http://127.0.0.1:9");
    let pipeline = UploadPipeline::new(store, upload_config(spool.path(), ExistencePolicy::Strict));

    let err = pipeline
        .run(&request(PathBuf::from("plain.txt"), 10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Usage(_)));
}
