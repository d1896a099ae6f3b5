// Sealed Upload - encrypt a file to an OpenPGP recipient and push it to S3 at a capped rate

pub mod cli;
pub mod config;
pub mod crypto;
pub mod pipeline;
pub mod storage;
pub mod transfer;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use pipeline::{UploadPipeline, UploadRequest};
pub use types::{AppError, AppResult, UploadOutcome};
