//! Password rotation cascade.
//!
//! Changing the password replaces the user's encryption key pair. Every item
//! key the user holds is unwrapped with the old pair, re-wrapped under a
//! freshly generated one and pushed back in bounded batches. The new pair is
//! staged until every batch is acknowledged; only then does it become the
//! session's active identity. Any failure before that point leaves the old
//! identity in place.
//!
//! Once the batches are in, the backend only holds records for the new pair,
//! so the password change and the new sealed secret keys must reach the
//! identity provider. Both steps are retried; if they still fail the rotation
//! stays pending and [`RekeyEngine::finish_pending`] completes it.

use crate::api_client::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use crate::transport::IdentityProvider;
use crate::types::{RekeyBatchRequest, UserKeysPage};
use futures::future::try_join_all;
use keyshelf_crypto::{
    EncryptionKeyPair, ItemKeyRecord, SharedSecret, SymmetricKey, derive_shared_secret, encoding,
    generate_key_pair, parse_public_key, unwrap_key, wrap_key,
};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PERSIST_ATTEMPTS: u32 = 3;
const PERSIST_BACKOFF_MS: u64 = 50;

/// Outcome of a completed rotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RekeyReport {
    pub records: usize,
    pub batch_sizes: Vec<usize>,
    /// Base64 public key now active for the user.
    pub public_key: String,
}

/// A rotation the backend accepted whose credentials are not saved yet.
struct PendingPersist {
    public_key: String,
    sealed_secret_keys: String,
    password_changed: bool,
}

impl PendingPersist {
    fn failure(&self, source: ClientError) -> ClientError {
        ClientError::RekeyNotPersisted {
            public_key: self.public_key.clone(),
            sealed_secret_keys: self.sealed_secret_keys.clone(),
            source: Box::new(source),
        }
    }
}

pub struct RekeyEngine {
    api: Arc<ApiClient>,
    provider: Arc<dyn IdentityProvider>,
    session: Arc<Session>,
    batch_size: usize,
    pending: Mutex<Option<PendingPersist>>,
}

impl RekeyEngine {
    pub fn new(
        api: Arc<ApiClient>,
        provider: Arc<dyn IdentityProvider>,
        session: Arc<Session>,
        batch_size: usize,
    ) -> Self {
        Self {
            api,
            provider,
            session,
            batch_size,
            pending: Mutex::new(None),
        }
    }

    /// Rotates the signed-in user's key pair as part of a password change.
    ///
    /// Fails with [`ClientError::RekeyNotPersisted`] when the rotation went
    /// through but could not be saved with the identity provider.
    pub async fn rekey(&self, old_password: &str, new_password: &str) -> ClientResult<RekeyReport> {
        let current = self.session.identity().await?;
        let username = self.session.username().await?;
        self.provider.sign_in(&username, old_password).await?;

        let records = self.fetch_all_records().await?;
        debug!("rotating {} item keys for {}", records.len(), current.user_id());

        let plain_keys = unwrap_all(&records, current.encryption())?;

        let staged = current.with_encryption(generate_key_pair());
        let public_key = staged.public_key();
        let rewrapped = rewrap_all(&records, &plain_keys, staged.encryption())?;
        drop(plain_keys);

        let sealed_secret_keys = staged.seal_secret_keys(new_password)?;

        let batches = partition_batches(rewrapped, self.batch_size);
        let batch_sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        let submissions = batches.into_iter().map(|encrypted_item_keys| {
            let request = RekeyBatchRequest {
                encryption_public_key: public_key.clone(),
                encrypted_item_keys,
            };
            async move { self.api.submit_rekey_batch(&request).await }
        });
        if let Err(e) = try_join_all(submissions).await {
            warn!("key rotation aborted, keeping current key pair: {e}");
            return Err(e);
        }

        self.session.commit_identity(staged).await;

        let mut pending = PendingPersist {
            public_key: public_key.clone(),
            sealed_secret_keys,
            password_changed: false,
        };
        if let Err(e) = self.persist(&mut pending, old_password, new_password).await {
            warn!("rotated key pair {public_key} is not saved yet: {e}");
            let err = pending.failure(e);
            *self.pending.lock().await = Some(pending);
            return Err(err);
        }

        info!(
            "rotated {} item keys in {} batches",
            records.len(),
            batch_sizes.len()
        );
        Ok(RekeyReport {
            records: records.len(),
            batch_sizes,
            public_key,
        })
    }

    /// Saves a rotation left pending by [`RekeyEngine::rekey`]. Returns
    /// `false` when nothing was pending.
    pub async fn finish_pending(&self, old_password: &str, new_password: &str) -> ClientResult<bool> {
        let mut slot = self.pending.lock().await;
        let Some(pending) = slot.as_mut() else {
            return Ok(false);
        };
        if let Err(e) = self.persist(pending, old_password, new_password).await {
            return Err(pending.failure(e));
        }

        info!("saved rotated key pair {}", pending.public_key);
        *slot = None;
        Ok(true)
    }

    /// Changes the password, then stores the secret keys sealed under it.
    /// Steps already done are not repeated.
    async fn persist(
        &self,
        pending: &mut PendingPersist,
        old_password: &str,
        new_password: &str,
    ) -> ClientResult<()> {
        if !pending.password_changed {
            with_retries("password update", || {
                self.provider.update_password(old_password, new_password)
            })
            .await?;
            pending.password_changed = true;
        }
        let sealed = pending.sealed_secret_keys.as_str();
        with_retries("secret key upload", || self.provider.store_secret_keys(sealed)).await
    }

    /// Every record the user holds, across all pages.
    async fn fetch_all_records(&self) -> ClientResult<Vec<ItemKeyRecord>> {
        let UserKeysPage {
            mut keys,
            total_pages,
        } = self.api.user_keys_page(1).await?;

        for page in 2..=total_pages {
            keys.extend(self.api.user_keys_page(page).await?.keys);
        }
        Ok(keys)
    }
}

async fn with_retries<F, Fut>(what: &str, mut op: F) -> ClientResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<()>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt + 1 < PERSIST_ATTEMPTS => {
                let backoff = Duration::from_millis(PERSIST_BACKOFF_MS << attempt);
                warn!("{what} failed, retrying in {backoff:?}: {e}");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Unwraps every record with `keys`. Shared secrets are derived once per
/// distinct wrapper key. Fails on the first record that does not unwrap.
fn unwrap_all(records: &[ItemKeyRecord], keys: &EncryptionKeyPair) -> ClientResult<Vec<SymmetricKey>> {
    let mut secrets: HashMap<&str, SharedSecret> = HashMap::new();
    let mut plain_keys = Vec::with_capacity(records.len());

    for record in records {
        let secret = match secrets.entry(record.wrapper_public_key.as_str()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let wrapper = parse_public_key(&record.wrapper_public_key)?;
                entry.insert(derive_shared_secret(&wrapper, &keys.secret))
            }
        };
        let wrapped = encoding::decode(&record.wrapped_key)?;
        plain_keys.push(unwrap_key(secret, &wrapped)?);
    }
    Ok(plain_keys)
}

/// Re-wraps each recovered key for the holder of `keys`, who is both
/// recipient and wrapper. Roles and item types carry over.
fn rewrap_all(
    records: &[ItemKeyRecord],
    plain_keys: &[SymmetricKey],
    keys: &EncryptionKeyPair,
) -> ClientResult<Vec<ItemKeyRecord>> {
    let secret = derive_shared_secret(&keys.public, &keys.secret);
    let public_key = keys.public_base64();

    records
        .iter()
        .zip(plain_keys)
        .map(|(record, key)| {
            Ok::<_, ClientError>(ItemKeyRecord {
                item_id: record.item_id.clone(),
                recipient_user_id: record.recipient_user_id.clone(),
                recipient_public_key: public_key.clone(),
                wrapper_public_key: public_key.clone(),
                wrapped_key: encoding::encode(&wrap_key(&secret, key)?),
                role: record.role.clone(),
                item_type: record.item_type.clone(),
            })
        })
        .collect()
}

/// Splits `items` into consecutive batches of at most `size` elements.
pub fn partition_batches<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        batches.push(items.by_ref().take(size).collect());
    }
    batches
}
