//! Symmetric key material: random item keys and the password-derived key.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use sha2::{Digest, Sha512};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of every symmetric key in bytes.
pub const KEY_SIZE: usize = 32;

/// Number of SHA-512 rounds applied to a password.
pub const PASSWORD_HASH_ROUNDS: usize = 500;

/// A 256-bit symmetric key, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(&self.0)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Generates a fresh random item key. Never reused across items.
pub fn generate_item_key() -> SymmetricKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    SymmetricKey(bytes)
}

/// Stretches a password into a symmetric key.
///
/// Deterministic: SHA-512 is applied [`PASSWORD_HASH_ROUNDS`] times to the
/// UTF-8 password and the first 32 bytes of the last digest are kept. Only
/// used to protect the identity's secret keys, never to key item envelopes.
pub fn derive_password_key(password: &str) -> SymmetricKey {
    let mut digest = Sha512::digest(password.as_bytes());
    for _ in 1..PASSWORD_HASH_ROUNDS {
        digest = Sha512::digest(digest);
    }

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest[..KEY_SIZE]);
    digest.as_mut_slice().zeroize();
    SymmetricKey(key)
}
