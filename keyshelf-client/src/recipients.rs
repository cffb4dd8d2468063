//! Resolves who a new item gets sealed for.

use crate::api_client::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::public_keys::PublicKeyCache;
use crate::types::{CreateItem, UserPublicKey};
use keyshelf_crypto::Recipient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct RecipientResolver {
    api: Arc<ApiClient>,
    cache: PublicKeyCache,
}

impl RecipientResolver {
    pub fn new(api: Arc<ApiClient>, cache: PublicKeyCache) -> Self {
        Self { api, cache }
    }

    /// Explicit users take precedence; otherwise a single reference id
    /// contributes everyone with access to it (restricted to `shared_roles`
    /// when given). Without either the item is sealed for the owner only.
    pub async fn resolve(&self, input: &CreateItem) -> ClientResult<Vec<Recipient>> {
        if !input.users.is_empty() {
            let names: Vec<&str> = input.users.iter().map(|u| u.username.as_str()).collect();
            let keys = self.user_keys(&names).await?;
            return Ok(input
                .users
                .iter()
                .map(|u| Recipient::new(&u.username, &keys[u.username.as_str()]).with_role(&u.role))
                .collect());
        }

        if let [reference_id] = input.reference_ids.as_slice() {
            let keys = if input.shared_roles.is_empty() {
                self.api.reference_keys(reference_id).await?
            } else {
                self.api
                    .reference_role_keys(reference_id, &input.shared_roles)
                    .await?
            };
            for key in &keys {
                self.cache.insert(&key.username, &key.public_key).await;
            }
            return Ok(keys.into_iter().map(UserPublicKey::into_recipient).collect());
        }

        Ok(Vec::new())
    }

    /// Public keys for `names`, from the cache when possible. A single
    /// backend round-trip covers every name the cache is missing.
    pub async fn user_keys(&self, names: &[&str]) -> ClientResult<HashMap<String, String>> {
        let (cached, missing) = self.cache.lookup_all(names).await;
        let mut keys: HashMap<String, String> = cached
            .into_iter()
            .map(|k| (k.username, k.public_key))
            .collect();

        if !missing.is_empty() {
            debug!("resolving {} uncached public keys", missing.len());
            for key in self.api.public_keys(&missing).await? {
                self.cache.insert(&key.username, &key.public_key).await;
                keys.entry(key.username).or_insert(key.public_key);
            }
        }

        if let Some(unknown) = names.iter().find(|n| !keys.contains_key(**n)) {
            return Err(ClientError::UserNotExisting((*unknown).to_string()));
        }
        Ok(keys)
    }
}
