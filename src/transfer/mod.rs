// Paced transfer of spooled ciphertext

pub mod rate_limiter;
pub mod upload;

pub use rate_limiter::{RateLimitedReader, MAX_CHUNK_SIZE};
pub use upload::{put_presigned, PutResponse};
