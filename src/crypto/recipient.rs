//! Recipient key material
//!
//! An armored OpenPGP public key is reduced to its raw key packets: the
//! primary key and its subkeys. User IDs, self-signatures and subkey binding
//! signatures are dropped without being checked. The result is
//! **unauthenticated, encryption-only** material: it says nothing about who
//! owns the key, only where ciphertext can be addressed. That is all a
//! single-operator push tool needs, and callers must not read more into it.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use pgp::crypto::public_key::PublicKeyAlgorithm;
use pgp::packet::{PublicKey, PublicSubkey};
use pgp::types::PublicKeyTrait;
use pgp::{Deserializable, SignedPublicKey};
use tracing::debug;

use crate::types::{AppError, AppResult};

/// Unauthenticated public key material for a single recipient.
#[derive(Debug, Clone)]
pub struct RecipientKey {
    primary: PublicKey,
    subkeys: Vec<PublicSubkey>,
}

/// The key packet that session keys will be encrypted to.
#[derive(Debug, Clone, Copy)]
pub enum EncryptionKey<'a> {
    Primary(&'a PublicKey),
    Subkey(&'a PublicSubkey),
}

impl EncryptionKey<'_> {
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        match self {
            EncryptionKey::Primary(k) => k.algorithm(),
            EncryptionKey::Subkey(k) => k.algorithm(),
        }
    }
}

/// Algorithms that can receive an encrypted session key.
fn can_encrypt(alg: PublicKeyAlgorithm) -> bool {
    matches!(
        alg,
        PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::ECDH
            | PublicKeyAlgorithm::Elgamal
    )
}

impl RecipientKey {
    /// Parse an ASCII-armored public key block from `path`.
    pub fn from_armor_file(path: &Path) -> AppResult<Self> {
        let file = File::open(path).map_err(|e| AppError::io_at(path, e))?;
        Self::from_armored(BufReader::new(file)).map_err(|e| match e {
            AppError::KeyParse(msg) => {
                AppError::KeyParse(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse an ASCII-armored public key block.
    ///
    /// Fails with `KeyParse` if the block is malformed or carries no key that
    /// can receive ciphertext.
    pub fn from_armored<R: Read>(input: R) -> AppResult<Self> {
        let (signed, _headers) = SignedPublicKey::from_armor_single(input)
            .map_err(|e| AppError::KeyParse(format!("invalid armored public key: {}", e)))?;

        let recipient = Self {
            primary: signed.primary_key,
            subkeys: signed.public_subkeys.into_iter().map(|s| s.key).collect(),
        };

        // Fail at parse time rather than halfway into an encryption.
        let key = recipient.encryption_key()?;
        debug!(
            algorithm = ?key.algorithm(),
            subkeys = recipient.subkeys.len(),
            "parsed recipient key (unauthenticated, no signature checks)"
        );

        Ok(recipient)
    }

    pub fn primary(&self) -> &PublicKey {
        &self.primary
    }

    pub fn subkeys(&self) -> &[PublicSubkey] {
        &self.subkeys
    }

    /// First encryption-capable subkey, else the primary key if it can encrypt.
    pub fn encryption_key(&self) -> AppResult<EncryptionKey<'_>> {
        if let Some(sub) = self.subkeys.iter().find(|k| can_encrypt(k.algorithm())) {
            return Ok(EncryptionKey::Subkey(sub));
        }
        if can_encrypt(self.primary.algorithm()) {
            return Ok(EncryptionKey::Primary(&self.primary));
        }
        Err(AppError::KeyParse(
            "public key has no encryption-capable key packet".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn test_prefers_encryption_subkey() {
        let key = RecipientKey::from_armor_file(&fixture("recipient.pub.asc")).unwrap();
        assert_eq!(key.subkeys().len(), 1);
        assert!(matches!(key.encryption_key().unwrap(), EncryptionKey::Subkey(_)));
    }

    #[test]
    fn test_falls_back_to_primary() {
        let key = RecipientKey::from_armor_file(&fixture("primary_only.pub.asc")).unwrap();
        assert!(key.subkeys().is_empty());
        assert!(matches!(key.encryption_key().unwrap(), EncryptionKey::Primary(_)));
    }

    #[test]
    fn test_sign_only_key_is_rejected() {
        let err = RecipientKey::from_armor_file(&fixture("sign_only.pub.asc")).unwrap_err();
        assert!(matches!(err, AppError::KeyParse(_)), "got {err:?}");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = RecipientKey::from_armored(&b"not a key at all"[..]).unwrap_err();
        assert!(matches!(err, AppError::KeyParse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = RecipientKey::from_armor_file(&fixture("does-not-exist.asc")).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
