//! Plaintext file -> spooled OpenPGP ciphertext
//!
//! The plaintext is wrapped in a binary literal data packet carrying its base
//! filename, sealed in an MDC-protected (SEIPD v1) AES-256 packet, and the
//! session key is encrypted to the recipient. The ciphertext lands in a fresh
//! temporary file that is removed when the returned [`CiphertextArtifact`]
//! is dropped. Encryption is streamed: memory use does not grow with the
//! plaintext.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::packet::{write_packet, PublicKeyEncryptedSessionKey};
use tempfile::NamedTempFile;
use tracing::debug;

use super::packet_writer::{
    PartialBodyWriter, SealingWriter, TAG_LITERAL_DATA, TAG_SYM_ENCRYPTED_PROTECTED_DATA,
};
use super::recipient::{EncryptionKey, RecipientKey};
use crate::types::{AppError, AppResult};

/// Plaintext is pulled in chunks of this size.
const COPY_CHUNK_SIZE: usize = 1024;

const SPOOL_PREFIX: &str = "uploader";

/// Symmetric cipher for the data packet; [`SealingWriter`] is AES-256 only.
const SESSION_CIPHER: SymmetricKeyAlgorithm = SymmetricKeyAlgorithm::AES256;

const SEIPD_VERSION: u8 = 1;
const LITERAL_MODE_BINARY: u8 = b'b';

/// A fully written, closed-for-writing ciphertext file.
///
/// Owns the backing file: dropping the artifact deletes it, on every path.
#[derive(Debug)]
pub struct CiphertextArtifact {
    spool: NamedTempFile,
    file_name: String,
}

impl CiphertextArtifact {
    pub fn path(&self) -> &Path {
        self.spool.path()
    }

    /// Filename hint recorded in the literal data packet.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Current size of the ciphertext on disk.
    pub fn len(&self) -> AppResult<u64> {
        let meta = std::fs::metadata(self.path()).map_err(|e| AppError::io_at(self.path(), e))?;
        Ok(meta.len())
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Open a fresh read-only handle positioned at the start.
    pub fn open(&self) -> AppResult<File> {
        File::open(self.path()).map_err(|e| AppError::io_at(self.path(), e))
    }

    /// Delete the backing file now, reporting any failure.
    pub fn close(self) -> AppResult<()> {
        let path = self.path().to_path_buf();
        self.spool.close().map_err(|e| AppError::io_at(path, e))
    }
}

/// Encrypt `plaintext` to the key stored at `recipient_key_path`.
pub fn encrypt(
    plaintext: &Path,
    recipient_key_path: &Path,
    spool_dir: &Path,
) -> AppResult<CiphertextArtifact> {
    let recipient = RecipientKey::from_armor_file(recipient_key_path)?;
    encrypt_to(plaintext, &recipient, spool_dir)
}

/// Encrypt `plaintext` to an already parsed recipient.
pub fn encrypt_to(
    plaintext: &Path,
    recipient: &RecipientKey,
    spool_dir: &Path,
) -> AppResult<CiphertextArtifact> {
    let key = recipient.encryption_key()?;
    let source = File::open(plaintext).map_err(|e| AppError::io_at(plaintext, e))?;
    let file_name = literal_name(&base_name(plaintext)).to_string();

    let mut spool = tempfile::Builder::new()
        .prefix(SPOOL_PREFIX)
        .tempfile_in(spool_dir)
        .map_err(|e| AppError::io_at(spool_dir, e))?;
    let spool_path = spool.path().to_path_buf();

    let sink = BufWriter::new(spool.as_file_mut());
    let (sink, plaintext_bytes) = seal_stream(source, plaintext, &file_name, key, sink)?;
    sink.into_inner()
        .map_err(|e| AppError::io_at(&spool_path, e.into_error()))?;
    spool
        .as_file()
        .sync_all()
        .map_err(|e| AppError::io_at(&spool_path, e))?;

    let artifact = CiphertextArtifact { spool, file_name };
    debug!(
        plaintext = %plaintext.display(),
        spool = %artifact.path().display(),
        plaintext_bytes,
        "encrypted plaintext to spool"
    );

    Ok(artifact)
}

/// Session key packet, then the sealed literal packet, streamed into `out`.
///
/// The plaintext is pulled [`COPY_CHUNK_SIZE`] bytes at a time; each layer
/// holds at most one partial body chunk. Returns the sink and the number of
/// plaintext bytes sealed.
fn seal_stream<R: Read, W: Write>(
    mut source: R,
    source_path: &Path,
    file_name: &str,
    key: EncryptionKey<'_>,
    mut out: W,
) -> AppResult<(W, u64)> {
    let mut rng = rand::thread_rng();
    let session_key = SESSION_CIPHER.new_session_key(&mut rng);

    let pkesk = match key {
        EncryptionKey::Primary(k) => PublicKeyEncryptedSessionKey::from_session_key_v3(
            &mut rng,
            &session_key,
            SESSION_CIPHER,
            k,
        ),
        EncryptionKey::Subkey(k) => PublicKeyEncryptedSessionKey::from_session_key_v3(
            &mut rng,
            &session_key,
            SESSION_CIPHER,
            k,
        ),
    }
    .map_err(|e| AppError::Crypto(format!("failed to encrypt session key: {}", e)))?;
    write_packet(&mut out, &pkesk)
        .map_err(|e| AppError::Crypto(format!("failed to write session key packet: {}", e)))?;

    let mut protected = PartialBodyWriter::start(out, TAG_SYM_ENCRYPTED_PROTECTED_DATA)?;
    protected.write_all(&[SEIPD_VERSION])?;
    let sealed = SealingWriter::new(protected, &session_key, &mut rng)?;

    let mut literal = PartialBodyWriter::start(sealed, TAG_LITERAL_DATA)?;
    write_literal_header(&mut literal, file_name)?;

    let mut buf = [0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(AppError::io_at(source_path, e)),
        };
        literal.write_all(&buf[..n])?;
        total += n as u64;
    }

    let out = literal.finish()?.finish()?.finish()?;
    Ok((out, total))
}

/// Binary mode, filename hint, and the current time as the date field.
fn write_literal_header<W: Write>(w: &mut W, file_name: &str) -> io::Result<()> {
    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0);

    w.write_all(&[LITERAL_MODE_BINARY, file_name.len() as u8])?;
    w.write_all(file_name.as_bytes())?;
    w.write_all(&created.to_be_bytes())
}

/// The literal packet stores at most 255 bytes of filename.
fn literal_name(name: &str) -> &str {
    let mut end = name.len().min(u8::MAX as usize);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Default directory for spooled ciphertext.
pub fn default_spool_dir() -> PathBuf {
    std::env::temp_dir()
}
