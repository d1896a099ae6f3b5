//! Streaming PUT against a presigned URL
//!
//! The ciphertext is read through a [`RateLimitedReader`] on the blocking
//! pool, one chunk per task, and handed to reqwest as a streaming body. The
//! declared `Content-Length` comes from the [`TransferDescriptor`]; presigned
//! PUTs do not accept chunked bodies.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream::{self, Stream};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, StatusCode};
use tracing::debug;

use super::rate_limiter::RateLimitedReader;
use crate::crypto::CiphertextArtifact;
use crate::types::{AppError, AppResult, TransferDescriptor};

/// What the endpoint said, and how long it took to say it.
#[derive(Debug, Clone, Copy)]
pub struct PutResponse {
    pub status: StatusCode,
    pub elapsed: Duration,
}

/// PUT `artifact` to `url` at no more than `descriptor.bytes_per_second`.
///
/// A non-success status is returned, not raised; only transport failures
/// are errors.
pub async fn put_presigned(
    client: &Client,
    url: &str,
    artifact: &CiphertextArtifact,
    descriptor: &TransferDescriptor,
) -> AppResult<PutResponse> {
    let reader = RateLimitedReader::new(artifact.open()?, descriptor.bytes_per_second)?;
    let body = Body::wrap_stream(paced_chunks(reader));

    debug!(
        bucket = %descriptor.bucket,
        key = %descriptor.key,
        content_length = descriptor.content_length,
        bytes_per_second = descriptor.bytes_per_second,
        "starting PUT"
    );

    let begin = Instant::now();
    let response = client
        .put(url)
        .header(CONTENT_LENGTH, descriptor.content_length)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            AppError::Transfer(format!(
                "PUT {}/{} failed: {}",
                descriptor.bucket, descriptor.key, e
            ))
        })?;
    let elapsed = begin.elapsed();

    Ok(PutResponse {
        status: response.status(),
        elapsed,
    })
}

/// Turn a blocking paced reader into a byte stream.
///
/// Each read runs on the blocking pool so the pacing sleep never stalls the
/// async runtime. Ends at the first zero-length read.
fn paced_chunks<R>(reader: RateLimitedReader<R>) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    R: Read + Send + 'static,
{
    let chunk_size = reader.chunk_size();

    stream::try_unfold(reader, move |mut reader| async move {
        let (reader, chunk) = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; chunk_size];
            let result = loop {
                match reader.read(&mut buf) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            };
            (reader, result.map(|n| {
                buf.truncate(n);
                buf
            }))
        })
        .await
        .map_err(io::Error::other)?;

        let chunk = chunk?;
        let next = if chunk.is_empty() {
            None
        } else {
            Some((Bytes::from(chunk), reader))
        };
        Ok::<_, io::Error>(next)
    })
}
