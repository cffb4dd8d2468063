//! User identity: an encryption key pair plus a signing key pair.
//!
//! The secret halves only leave the client inside a blob sealed with the
//! password-derived key: `encryption_secret(32) || signing_seed(32)`.

use crate::cipher::{decrypt_payload, encrypt_payload};
use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::key::derive_password_key;
use crate::keypair::{EncryptionKeyPair, SigningKeyPair, generate_key_pair};
use std::fmt;
use zeroize::Zeroize;

const SECRET_BLOB_SIZE: usize = 64;

#[derive(Clone)]
pub struct Identity {
    user_id: String,
    encryption: EncryptionKeyPair,
    signing: SigningKeyPair,
}

impl Identity {
    /// Creates a brand new identity (sign-up).
    pub fn generate(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            encryption: generate_key_pair(),
            signing: SigningKeyPair::generate(),
        }
    }

    pub fn from_parts(
        user_id: impl Into<String>,
        encryption: EncryptionKeyPair,
        signing: SigningKeyPair,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            encryption,
            signing,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn encryption(&self) -> &EncryptionKeyPair {
        &self.encryption
    }

    pub fn signing(&self) -> &SigningKeyPair {
        &self.signing
    }

    /// Base64 encryption public key, as published to other users.
    pub fn public_key(&self) -> String {
        self.encryption.public_base64()
    }

    /// Returns a copy of this identity with the encryption key pair replaced.
    /// The signing key pair is carried over.
    pub fn with_encryption(&self, encryption: EncryptionKeyPair) -> Self {
        Self {
            user_id: self.user_id.clone(),
            encryption,
            signing: self.signing.clone(),
        }
    }

    /// Seals both secret keys under the password-derived key (base64).
    pub fn seal_secret_keys(&self, password: &str) -> CryptoResult<String> {
        let key = derive_password_key(password);

        let mut merged = [0u8; SECRET_BLOB_SIZE];
        merged[..32].copy_from_slice(&self.encryption.secret_bytes());
        merged[32..].copy_from_slice(&self.signing.seed());

        let sealed = encrypt_payload(&key, &merged);
        merged.zeroize();
        Ok(encoding::encode(&sealed?))
    }

    /// Restores an identity from a blob produced by [`Identity::seal_secret_keys`].
    ///
    /// A wrong password yields [`CryptoError::Decryption`].
    pub fn open_secret_keys(
        user_id: impl Into<String>,
        password: &str,
        blob: &str,
    ) -> CryptoResult<Self> {
        let key = derive_password_key(password);
        let sealed = encoding::decode(blob)?;
        let mut merged = decrypt_payload(&key, &sealed)?;

        if merged.len() != SECRET_BLOB_SIZE {
            let actual = merged.len();
            merged.zeroize();
            return Err(CryptoError::InvalidKeyLength {
                expected: SECRET_BLOB_SIZE,
                actual,
            });
        }

        let mut encryption_secret = [0u8; 32];
        let mut signing_seed = [0u8; 32];
        encryption_secret.copy_from_slice(&merged[..32]);
        signing_seed.copy_from_slice(&merged[32..]);
        merged.zeroize();

        let identity = Self {
            user_id: user_id.into(),
            encryption: EncryptionKeyPair::from_secret_bytes(encryption_secret),
            signing: SigningKeyPair::from_seed(signing_seed),
        };
        encryption_secret.zeroize();
        signing_seed.zeroize();
        Ok(identity)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
