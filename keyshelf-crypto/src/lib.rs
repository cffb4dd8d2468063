//! Envelope encryption primitives for Keyshelf.
//!
//! Provides end-to-end encryption for shared items using:
//! - XChaCha20-Poly1305 for item and file payloads
//! - X25519 + XSalsa20-Poly1305 for wrapping item keys between users
//! - Iterated SHA-512 for the password key protecting an identity
//! - Zeroization of symmetric key material
//!
//! # Architecture
//!
//! Every item is sealed with its own random **item key**. The item key is
//! never stored in the clear: for each authorized user it is wrapped under
//! the shared secret of that user's public key and the wrapper's secret key,
//! producing one [`ItemKeyRecord`] per user.
//!
//! This allows:
//! - Granting access by re-wrapping a key, without re-uploading ciphertext
//! - Revoking access by deleting a record
//! - Updating an item under its existing key (`reseal`)
//! - Rotating a user's key pair by re-wrapping only their records

mod cipher;
pub mod encoding;
pub mod envelope;
mod error;
pub mod identity;
mod key;
pub mod keypair;

pub use cipher::{
    NONCE_SIZE, TAG_SIZE, decrypt_json, decrypt_payload, encrypt_json, encrypt_payload,
};
pub use envelope::{
    ItemEnvelope, ItemKeyRecord, Recipient, ResealedItem, SealedFile, SealedItem, open, open_file,
    open_wrapped, recover_item_key, reseal, rewrap, seal, seal_file,
};
pub use error::{CryptoError, CryptoResult};
pub use identity::Identity;
pub use key::{
    KEY_SIZE, PASSWORD_HASH_ROUNDS, SymmetricKey, derive_password_key, generate_item_key,
};
pub use keypair::{
    EncryptionKeyPair, SharedSecret, SigningKeyPair, derive_shared_secret, generate_key_pair,
    parse_public_key, unwrap_key, wrap_key,
};
