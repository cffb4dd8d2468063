//! Session context: the signed-in username, the active identity and the
//! public key cache.
//!
//! Passed explicitly to every operation instead of living in process-wide
//! state. The identity is swapped wholesale; readers take an `Arc` snapshot
//! so an in-flight operation keeps using the key pair it started with.

use crate::error::{ClientError, ClientResult};
use crate::public_keys::PublicKeyCache;
use keyshelf_crypto::Identity;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub struct Session {
    username: RwLock<Option<String>>,
    identity: RwLock<Option<Arc<Identity>>>,
    public_keys: PublicKeyCache,
}

impl Session {
    pub fn new() -> Self {
        Self {
            username: RwLock::new(None),
            identity: RwLock::new(None),
            public_keys: PublicKeyCache::new(),
        }
    }

    /// A session signed in under the identity's own user id.
    pub fn with_identity(identity: Identity) -> Self {
        Self {
            username: RwLock::new(Some(identity.user_id().to_string())),
            identity: RwLock::new(Some(Arc::new(identity))),
            public_keys: PublicKeyCache::new(),
        }
    }

    /// Starts a session. `username` is what the identity provider accepts
    /// at sign-in and may differ from the identity's user id.
    pub async fn begin(&self, username: impl Into<String>, identity: Identity) {
        *self.username.write().await = Some(username.into());
        self.commit_identity(identity).await;
    }

    /// Login name the session was started with.
    pub async fn username(&self) -> ClientResult<String> {
        self.username
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotSignedIn)
    }

    /// Snapshot of the active identity.
    pub async fn identity(&self) -> ClientResult<Arc<Identity>> {
        self.identity
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotSignedIn)
    }

    pub async fn is_signed_in(&self) -> bool {
        self.identity.read().await.is_some()
    }

    /// Makes `identity` the active one. Used at sign-in and when a key
    /// rotation has been confirmed by the backend.
    pub async fn commit_identity(&self, identity: Identity) {
        info!("active key pair for {} is now {}", identity.user_id(), identity.public_key());
        *self.identity.write().await = Some(Arc::new(identity));
    }

    /// Drops the username, the identity and every cached public key.
    pub async fn clear(&self) {
        *self.username.write().await = None;
        *self.identity.write().await = None;
        self.public_keys.clear().await;
    }

    pub fn public_keys(&self) -> &PublicKeyCache {
        &self.public_keys
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
