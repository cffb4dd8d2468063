//! Session-scoped cache of other users' public keys.
//!
//! Populated opportunistically from responses that reveal
//! `{username, publicKey}` pairs and consulted before asking the backend to
//! resolve recipients. First write wins; entries are never overwritten.

use crate::types::UserPublicKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe username → public key cache.
#[derive(Clone)]
pub struct PublicKeyCache {
    keys: Arc<RwLock<HashMap<String, String>>>,
}

impl PublicKeyCache {
    pub fn new() -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Records a key unless the username is already known. Returns whether
    /// the entry was added.
    pub async fn insert(&self, username: &str, public_key: &str) -> bool {
        let mut keys = self.keys.write().await;
        if keys.contains_key(username) {
            return false;
        }
        keys.insert(username.to_string(), public_key.to_string());
        true
    }

    pub async fn get(&self, username: &str) -> Option<String> {
        self.keys.read().await.get(username).cloned()
    }

    /// Splits `usernames` into cached entries and names that still need a
    /// backend lookup.
    pub async fn lookup_all(&self, usernames: &[&str]) -> (Vec<UserPublicKey>, Vec<String>) {
        let keys = self.keys.read().await;
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for name in usernames {
            match keys.get(*name) {
                Some(pk) => found.push(UserPublicKey::new(*name, pk.clone())),
                None => missing.push((*name).to_string()),
            }
        }
        (found, missing)
    }

    pub async fn clear(&self) {
        self.keys.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

impl Default for PublicKeyCache {
    fn default() -> Self {
        Self::new()
    }
}
