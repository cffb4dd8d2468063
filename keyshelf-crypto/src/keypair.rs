//! Asymmetric key pairs and key wrapping.
//!
//! Key agreement is X25519; a wrapped key is the item key sealed with
//! XSalsa20-Poly1305 under the precomputed shared secret of two key pairs.
//! Because the shared secret is symmetric, the wrapper and the recipient
//! derive the same secret from opposite halves:
//! `derive(B_pub, a_sec) == derive(A_pub, b_sec)`.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{KEY_SIZE, SymmetricKey};
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::RngCore;

/// Size of an X25519 public or secret key.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Nonce size for wrapped keys (XSalsa20).
pub const WRAP_NONCE_SIZE: usize = 24;

/// X25519 key pair used to wrap and unwrap item keys.
///
/// The secret key implements `ZeroizeOnDrop` (from crypto_box).
#[derive(Clone)]
pub struct EncryptionKeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl EncryptionKeyPair {
    /// Returns the public key as raw 32-byte array.
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Returns the secret key as raw 32-byte array.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Public key in the base64 form used on the wire.
    pub fn public_base64(&self) -> String {
        encoding::encode(self.public.as_bytes())
    }

    /// Reconstructs a key pair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }
}

/// Ed25519 signing key pair carried by an identity.
#[derive(Clone)]
pub struct SigningKeyPair {
    pub signing: SigningKey,
}

impl SigningKeyPair {
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn seed(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn public_base64(&self) -> String {
        encoding::encode(self.verifying_key().as_bytes())
    }
}

/// Generates a new X25519 key pair for key agreement.
pub fn generate_key_pair() -> EncryptionKeyPair {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    EncryptionKeyPair::from_secret_bytes(bytes)
}

/// Decodes a base64 X25519 public key.
pub fn parse_public_key(encoded: &str) -> CryptoResult<PublicKey> {
    let bytes = encoding::decode_array::<PUBLIC_KEY_SIZE>(encoded)?;
    Ok(PublicKey::from(bytes))
}

/// Precomputed shared secret between one party's public key and another's
/// secret key.
pub struct SharedSecret(SalsaBox);

/// Derives the shared secret for `(peer_public, own_secret)`.
pub fn derive_shared_secret(peer_public: &PublicKey, own_secret: &SecretKey) -> SharedSecret {
    SharedSecret(SalsaBox::new(peer_public, own_secret))
}

/// Wraps an item key under a shared secret. Output is `nonce || sealed`.
pub fn wrap_key(secret: &SharedSecret, plain_key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    let mut nonce = [0u8; WRAP_NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);

    let sealed = secret
        .0
        .encrypt(crypto_box::Nonce::from_slice(&nonce), plain_key.as_bytes().as_slice())
        .map_err(|e| CryptoError::Encryption(format!("key wrap failed: {e}")))?;

    let mut out = Vec::with_capacity(WRAP_NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Unwraps an item key. Never returns a key unless the tag verifies.
pub fn unwrap_key(secret: &SharedSecret, wrapped: &[u8]) -> CryptoResult<SymmetricKey> {
    if wrapped.len() <= WRAP_NONCE_SIZE {
        return Err(CryptoError::Decryption(format!(
            "wrapped key too short ({} bytes)",
            wrapped.len()
        )));
    }

    let (nonce, sealed) = wrapped.split_at(WRAP_NONCE_SIZE);
    let plain = secret
        .0
        .decrypt(crypto_box::Nonce::from_slice(nonce), sealed)
        .map_err(|_| {
            CryptoError::Decryption("key unwrap failed (wrong key or tampered data)".to_string())
        })?;

    if plain.len() != KEY_SIZE {
        return Err(CryptoError::Decryption(format!(
            "unwrapped key has {} bytes, expected {KEY_SIZE}",
            plain.len()
        )));
    }
    SymmetricKey::from_slice(&plain)
}

/// Wraps `plain_key` for `recipient` with `wrapper`'s secret key and returns
/// it base64 encoded.
pub fn wrap_key_for(
    plain_key: &SymmetricKey,
    recipient: &PublicKey,
    wrapper: &SecretKey,
) -> CryptoResult<String> {
    let secret = derive_shared_secret(recipient, wrapper);
    Ok(encoding::encode(&wrap_key(&secret, plain_key)?))
}

/// Reverses [`wrap_key_for`]: `counterparty` is the public key of whoever
/// wrapped the key, `own` is the holder's secret key.
pub fn unwrap_key_from(
    wrapped: &str,
    counterparty: &PublicKey,
    own: &SecretKey,
) -> CryptoResult<SymmetricKey> {
    let wrapped = encoding::decode(wrapped)
        .map_err(|e| CryptoError::Decryption(format!("unreadable wrapped key: {e}")))?;
    unwrap_key(&derive_shared_secret(counterparty, own), &wrapped)
}
