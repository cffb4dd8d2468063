//! Share workflow: share, revoke, role changes, ownership transfer, item
//! updates and bulk creation of sealed items.
//!
//! Orchestrates the sharing lifecycle by coordinating between the API client
//! (key records, roles) and the envelope functions (key wrapping). Granting
//! access re-wraps an existing item key; the ciphertext is never re-uploaded.

use crate::api_client::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::projector::open_node;
use crate::recipients::RecipientResolver;
use crate::session::Session;
use crate::types::*;
use futures::future::join_all;
use keyshelf_crypto::{ItemKeyRecord, Recipient, recover_item_key, reseal, rewrap, seal};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of [`SharingCoordinator::bulk_create`]. Items that failed to seal
/// are reported individually; the rest were created.
#[derive(Debug, Default)]
pub struct BulkCreateReport {
    /// Created item nodes, `item` decrypted (absent when undecryptable).
    pub created: Vec<Value>,
    pub failures: Vec<BulkCreateFailure>,
}

#[derive(Debug)]
pub struct BulkCreateFailure {
    /// Position of the item in the input.
    pub index: usize,
    pub error: ClientError,
}

/// Orchestrates item sharing workflows.
pub struct SharingCoordinator {
    api: Arc<ApiClient>,
    session: Arc<Session>,
    recipients: RecipientResolver,
}

impl SharingCoordinator {
    pub fn new(api: Arc<ApiClient>, session: Arc<Session>) -> Self {
        let recipients = RecipientResolver::new(api.clone(), session.public_keys().clone());
        Self {
            api,
            session,
            recipients,
        }
    }

    /// Grants `user` access to `item_id` with `role`.
    ///
    /// Recovers the item key from a record the actor holds and wraps it for
    /// the target's public key.
    pub async fn share(&self, item_id: &str, user: &str, role: &str) -> ClientResult<()> {
        let identity = self.session.identity().await?;
        let existing = self.api.share_keys(item_id, user).await?;
        let public_key = existing
            .public_key
            .ok_or_else(|| ClientError::UserNotExisting(user.to_string()))?;
        self.session.public_keys().insert(user, &public_key).await;

        let target = Recipient::new(user, public_key).with_role(role);
        let keys = rewrap_for(&existing.keys, identity.user_id(), &target, identity.encryption())?;

        self.api
            .submit_share(&ShareRequest {
                keys,
                item_id: item_id.to_string(),
                user: user.to_string(),
            })
            .await?;
        info!("shared item {item_id} with {user} as {role}");
        Ok(())
    }

    pub async fn revoke(&self, item_id: &str, user: &str) -> ClientResult<()> {
        self.api.revoke(item_id, user).await?;
        info!("revoked {user} from item {item_id}");
        Ok(())
    }

    /// Revokes `user` from every item in `item_ids` in one request.
    pub async fn bulk_revoke(&self, user: &str, item_ids: &[String]) -> ClientResult<()> {
        if item_ids.is_empty() {
            return Ok(());
        }
        self.api.bulk_revoke(user, item_ids).await?;
        info!("revoked {user} from {} items", item_ids.len());
        Ok(())
    }

    /// Changes the role on an existing record; key material is untouched.
    pub async fn update_role(&self, item_id: &str, user: &str, role: &str) -> ClientResult<()> {
        self.api.update_role(user, item_id, role).await?;
        info!("{user} now has role {role} on item {item_id}");
        Ok(())
    }

    /// Hands ownership of `item_id` to an already-shared `user`. The previous
    /// owner keeps access with `role`.
    pub async fn transfer_ownership(&self, item_id: &str, user: &str, role: &str) -> ClientResult<()> {
        self.api.transfer_ownership(item_id, user, role).await?;
        info!("transferred item {item_id} to {user}");
        Ok(())
    }

    /// Replaces the content of `item_id` under its existing key.
    ///
    /// `add_users` receive a record for that key; `remove_users` lose theirs.
    /// Records held by everyone else stay valid.
    pub async fn update_item(
        &self,
        item_id: &str,
        item: &Value,
        add_users: &[UserRole],
        remove_users: &[String],
    ) -> ClientResult<()> {
        let identity = self.session.identity().await?;
        let lookup = self
            .api
            .update_keys(
                item_id,
                &UpdateKeysRequest {
                    add_users: add_users.to_vec(),
                    remove_users: remove_users.to_vec(),
                },
            )
            .await?;
        let record = lookup
            .key
            .ok_or_else(|| ClientError::NotFound(format!("no readable key for item {item_id}")))?;

        let mut added = Vec::with_capacity(add_users.len());
        for user in add_users {
            let key = lookup
                .users
                .iter()
                .find(|k| k.username == user.username)
                .ok_or_else(|| ClientError::UserNotExisting(user.username.clone()))?;
            self.session.public_keys().insert(&key.username, &key.public_key).await;
            added.push(Recipient::new(&user.username, &key.public_key).with_role(&user.role));
        }

        let update = reseal(&record, item, &added, &identity)?;
        let mut user_keys = update.added_records;
        for key in &mut user_keys {
            key.item_type = record.item_type.clone();
        }

        self.api
            .update_item(
                item_id,
                &UpdateItemRequest {
                    item: update.ciphertext,
                    user_keys,
                    remove_users: remove_users.to_vec(),
                },
            )
            .await?;
        info!(
            "updated item {item_id}: {} users added, {} removed",
            add_users.len(),
            remove_users.len()
        );
        Ok(())
    }

    pub async fn archive(&self, item_id: &str) -> ClientResult<()> {
        self.api.archive(item_id).await?;
        info!("archived item {item_id}");
        Ok(())
    }

    pub async fn restore(&self, item_id: &str) -> ClientResult<()> {
        self.api.restore(item_id).await?;
        info!("restored item {item_id}");
        Ok(())
    }

    /// Seals every item independently and submits the successes in one
    /// batch. An item whose recipients cannot be resolved or which fails to
    /// seal is reported in [`BulkCreateReport::failures`] without affecting
    /// the others; a rejected batch fails the whole call.
    pub async fn bulk_create(&self, item_type: &str, items: Vec<CreateItem>) -> ClientResult<BulkCreateReport> {
        let identity = self.session.identity().await?;

        let sealed = join_all(items.into_iter().enumerate().map(|(index, input)| {
            let identity = identity.clone();
            async move {
                let sealed = async move {
                    let recipients = self.recipients.resolve(&input).await?;
                    let id = Uuid::now_v7().to_string();
                    let sealed = seal(&id, &input.item, &recipients, &identity)?;
                    let mut records = sealed.key_records.into_iter();
                    let owner = records
                        .next()
                        .ok_or_else(|| ClientError::unexpected(0, "sealed item has no owner record"))?;
                    Ok::<_, ClientError>(EncryptedItem {
                        id,
                        item: sealed.envelope.ciphertext,
                        key: owner.wrapped_key,
                        public_key: owner.wrapper_public_key,
                        user_keys: records.collect(),
                        roles: input.roles,
                        reference_ids: input.reference_ids,
                        shared_roles: input.shared_roles,
                    })
                }
                .await;
                (index, sealed)
            }
        }))
        .await;

        let mut report = BulkCreateReport::default();
        let mut ready = Vec::new();
        for (index, result) in sealed {
            match result {
                Ok(item) => ready.push(item),
                Err(error) => {
                    warn!("item {index} of bulk create failed: {error}");
                    report.failures.push(BulkCreateFailure { index, error });
                }
            }
        }
        if ready.is_empty() {
            return Ok(report);
        }

        let count = ready.len();
        let created = self
            .api
            .create_items(&BulkCreateRequest {
                items: ready,
                item_type: item_type.to_string(),
            })
            .await?;

        report.created = created
            .into_iter()
            .map(|mut node| {
                if let Value::Object(fields) = &mut node {
                    match open_node(fields, identity.encryption()) {
                        Ok(item) => {
                            fields.insert("item".to_string(), item);
                        }
                        Err(e) => {
                            warn!("created item is undecryptable: {e}");
                            fields.remove("item");
                        }
                    }
                }
                node
            })
            .collect();
        info!("created {count} {item_type} items");
        Ok(report)
    }
}

/// Wraps the item key behind each distinct item in `records` for `target`.
///
/// Prefers the actor's own records; the first one that unwraps wins.
fn rewrap_for(
    records: &[ItemKeyRecord],
    actor: &str,
    target: &Recipient,
    keys: &keyshelf_crypto::EncryptionKeyPair,
) -> ClientResult<Vec<ItemKeyRecord>> {
    let mut by_item: BTreeMap<&str, Vec<&ItemKeyRecord>> = BTreeMap::new();
    for record in records {
        by_item.entry(record.item_id.as_str()).or_default().push(record);
    }

    let mut out = Vec::with_capacity(by_item.len());
    for (item_id, mut candidates) in by_item {
        candidates.sort_by_key(|r| r.recipient_user_id != actor);
        let key = candidates
            .iter()
            .find_map(|r| recover_item_key(r, keys).ok())
            .ok_or_else(|| ClientError::Decryption(format!("no readable key for item {item_id}")))?;

        let mut record = rewrap(item_id, &key, target, keys)?;
        record.item_type = candidates[0].item_type.clone();
        out.push(record);
    }
    Ok(out)
}
