//! Client error types.

use keyshelf_crypto::CryptoError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by sharing, key rotation and decoding operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Tampered data or wrong key. Recovered locally while walking a
    /// response tree; surfaced by single-item operations.
    #[error("could not decrypt: {0}")]
    Decryption(String),

    #[error("user is not allowed to perform this action")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("item was not shared with the user")]
    UserNotShared,

    #[error("item was already shared with the user")]
    AlreadyShared,

    #[error("the role does not exist on the item")]
    RoleDoesNotExist,

    #[error("user does not exist: {0}")]
    UserNotExisting(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("unexpected backend response ({status}): {message}")]
    Unexpected { status: u16, message: String },

    /// Every rotated record was accepted but the new password or the
    /// sealed secret keys did not reach the identity provider. The rotated
    /// identity is active in the session; `sealed_secret_keys` is the blob
    /// that still has to be stored (see `KeyshelfClient::finish_rekey`).
    #[error("key rotation to {public_key} was accepted but not saved: {source}")]
    RekeyNotPersisted {
        public_key: String,
        sealed_secret_keys: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    pub fn unexpected(status: u16, message: impl Into<String>) -> Self {
        ClientError::Unexpected {
            status,
            message: message.into(),
        }
    }

    pub fn is_decryption(&self) -> bool {
        matches!(self, ClientError::Decryption(_))
    }
}

impl From<CryptoError> for ClientError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption(msg) => ClientError::Decryption(msg),
            other => ClientError::Crypto(other),
        }
    }
}
