//! OpenPGP sealing of upload payloads
//!
//! - [`recipient`]: unauthenticated recipient key material
//! - [`encryptor`]: plaintext file -> spooled ciphertext artifact
//! - `packet_writer`: partial-length framing and the AES-256/MDC data stream
//!
//! There is exactly one recipient per upload and no decryption path.

pub mod encryptor;
mod packet_writer;
pub mod recipient;

pub use encryptor::{default_spool_dir, encrypt, encrypt_to, CiphertextArtifact};
pub use recipient::{EncryptionKey, RecipientKey};
