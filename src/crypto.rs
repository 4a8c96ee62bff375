// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Envelope encryption for stored files using AES-256-GCM.
//!
//! Every file is sealed under its own random 256-bit key. The on-disk
//! envelope is `nonce (12) ‖ auth tag (16) ‖ ciphertext`; the nonce is
//! freshly random for every encryption call and is never derived from the
//! key. Keys travel hex-encoded (in download links and, for authenticated
//! owners, in the transfer record).

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key size (32 bytes).
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size (12 bytes, 96-bit).
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key: expected {KEY_SIZE} bytes hex-encoded")]
    InvalidKey,

    #[error("envelope too short to contain nonce and tag")]
    EnvelopeTooShort,

    #[error("encryption failed")]
    EncryptionFailed,

    /// Tag verification failed: tampered ciphertext or wrong key.
    #[error("authentication failed")]
    AuthenticationFailed,
}

/// A per-file AES-256 key, zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TransferKey([u8; KEY_SIZE]);

impl TransferKey {
    /// Generate a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a hex-encoded key (as found in download links).
    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(encoded).map_err(|_| CryptoError::InvalidKey)?;
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self(key))
    }

    /// Hex encoding for persistence and shareable links.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Encrypt a buffer, producing the storage envelope `nonce ‖ tag ‖ ciphertext`.
pub fn encrypt(plaintext: &[u8], key: &TransferKey) -> Result<Vec<u8>, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|_| CryptoError::EncryptionFailed)?;
    // aes-gcm appends the tag to the ciphertext; the envelope stores it up
    // front, between nonce and ciphertext.
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    let mut envelope = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + ciphertext.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(tag);
    envelope.extend_from_slice(ciphertext);
    Ok(envelope)
}

/// Decrypt a storage envelope back into the original bytes.
///
/// Fails with [`CryptoError::AuthenticationFailed`] when the tag does not
/// verify (tampered envelope or wrong key), never with silent garbage.
pub fn decrypt(envelope: &[u8], key: &TransferKey) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::EnvelopeTooShort);
    }

    let (nonce_bytes, rest) = envelope.split_at(NONCE_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);

    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|_| CryptoError::InvalidKey)?;

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}
