//! Throughput-capped reader
//!
//! Paces an underlying byte source so the measured average rate stays at or
//! below a target. After every read of `n` bytes the calling thread sleeps for
//! `n / bytes_per_second` seconds, which gives an even drip instead of the
//! burst-then-stall shape of a token bucket.
//!
//! The sleep is blocking on purpose; async callers drive this reader from
//! `tokio::task::spawn_blocking` (see [`super::upload`]).

use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use crate::types::{AppError, AppResult};

/// Upper bound for a single underlying read, whatever the target rate.
///
/// Without it the default "unbounded" cap (2^31-1 KB/s) would size each read
/// at terabytes.
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Reader that never lets average throughput exceed `bytes_per_second`.
#[derive(Debug)]
pub struct RateLimitedReader<R> {
    inner: R,
    bytes_per_second: u64,
    chunk_size: usize,
}

impl<R: Read> RateLimitedReader<R> {
    /// Wrap `inner`, capping it at `bytes_per_second`.
    ///
    /// One chunk is one second's worth of bytes, clamped to [`MAX_CHUNK_SIZE`].
    pub fn new(inner: R, bytes_per_second: u64) -> AppResult<Self> {
        if bytes_per_second == 0 {
            return Err(AppError::Usage(
                "rate limit must be greater than zero bytes per second".to_string(),
            ));
        }

        let chunk_size = usize::try_from(bytes_per_second)
            .unwrap_or(usize::MAX)
            .min(MAX_CHUNK_SIZE);

        Ok(Self {
            inner,
            bytes_per_second,
            chunk_size,
        })
    }

    /// Largest number of bytes a single `read` call will return.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.bytes_per_second
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn pause_for(&self, bytes: usize) -> Duration {
        Duration::from_secs_f64(bytes as f64 / self.bytes_per_second as f64)
    }
}

impl<R: Read> Read for RateLimitedReader<R> {
    /// Reads at most `min(buf.len(), chunk_size)` bytes, then sleeps in
    /// proportion to what was read. End-of-stream returns `Ok(0)` without
    /// sleeping; underlying errors are returned unchanged.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let limit = buf.len().min(self.chunk_size);
        let n = self.inner.read(&mut buf[..limit])?;

        if n > 0 {
            thread::sleep(self.pause_for(n));
        }

        Ok(n)
    }
}
