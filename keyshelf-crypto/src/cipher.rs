//! Authenticated symmetric encryption for item and file payloads.
//!
//! XChaCha20-Poly1305 with a fresh random 24-byte nonce per call. The output
//! layout is `nonce || ciphertext || tag`, so a ciphertext is self-contained
//! and only the key is needed to open it.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::key::SymmetricKey;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Nonce size in bytes.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Encrypts raw bytes with an item key.
pub fn encrypt_payload(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(format!("payload seal failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypts bytes produced by [`encrypt_payload`].
///
/// Fails with [`CryptoError::Decryption`] if the tag does not verify.
pub fn decrypt_payload(key: &SymmetricKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption(format!(
            "ciphertext too short ({} bytes)",
            ciphertext.len()
        )));
    }

    let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher.decrypt(XNonce::from_slice(nonce), sealed).map_err(|_| {
        CryptoError::Decryption("payload open failed (wrong key or tampered data)".to_string())
    })
}

/// Serializes a value to JSON, encrypts it and returns base64.
pub fn encrypt_json<T: Serialize + ?Sized>(key: &SymmetricKey, value: &T) -> CryptoResult<String> {
    let plaintext = serde_json::to_vec(value)?;
    Ok(encoding::encode(&encrypt_payload(key, &plaintext)?))
}

/// Reverses [`encrypt_json`].
pub fn decrypt_json<T: DeserializeOwned>(key: &SymmetricKey, encoded: &str) -> CryptoResult<T> {
    let ciphertext = encoding::decode(encoded)
        .map_err(|e| CryptoError::Decryption(format!("unreadable ciphertext: {e}")))?;
    let plaintext = decrypt_payload(key, &ciphertext)?;
    Ok(serde_json::from_slice(&plaintext)?)
}
