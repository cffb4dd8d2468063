//! The caller-facing Keyshelf client.
//!
//! Wires the collaborators (transport, identity provider, projection engine,
//! blob store) to one [`Session`] and exposes sealing, sharing, rotation,
//! response decoding and file operations.

use crate::api_client::ApiClient;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::files::{FileManager, UploadedFile};
use crate::http::{HttpBlobStore, HttpTransport};
use crate::projection::ProjectionEngine;
use crate::projector::ResponseProjector;
use crate::query::QueryNode;
use crate::rekey::{RekeyEngine, RekeyReport};
use crate::session::Session;
use crate::sharing::{BulkCreateReport, SharingCoordinator};
use crate::transport::{BlobStore, IdentityProvider, Transport};
use crate::types::{CreateItem, UserRole};
use keyshelf_crypto::{Identity, ItemEnvelope, ItemKeyRecord, Recipient, SealedItem};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub struct KeyshelfClient {
    session: Arc<Session>,
    provider: Arc<dyn IdentityProvider>,
    sharing: SharingCoordinator,
    rekey: RekeyEngine,
    projector: ResponseProjector,
    files: FileManager,
}

impl KeyshelfClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        provider: Arc<dyn IdentityProvider>,
        projection: Arc<dyn ProjectionEngine>,
        blobs: Arc<dyn BlobStore>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let session = Arc::new(Session::new());
        let api = Arc::new(ApiClient::new(transport, provider.clone()));

        Ok(Self {
            sharing: SharingCoordinator::new(api.clone(), session.clone()),
            rekey: RekeyEngine::new(
                api.clone(),
                provider.clone(),
                session.clone(),
                config.rekey_batch_size,
            ),
            projector: ResponseProjector::new(projection, session.public_keys().clone()),
            files: FileManager::new(api, blobs, session.clone()),
            session,
            provider,
        })
    }

    /// Client talking to the configured backend over HTTPS.
    pub fn with_http(
        config: ClientConfig,
        provider: Arc<dyn IdentityProvider>,
        projection: Arc<dyn ProjectionEngine>,
    ) -> ClientResult<Self> {
        let transport = Arc::new(HttpTransport::new(config.clone())?);
        let blobs = Arc::new(HttpBlobStore::new(&config)?);
        Self::new(config, transport, provider, projection, blobs)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    // ── Session ──

    /// Signs in and restores the identity from its password-sealed secret keys.
    pub async fn sign_in(&self, username: &str, password: &str) -> ClientResult<()> {
        let user = self.provider.sign_in(username, password).await?;
        let identity = Identity::open_secret_keys(user.user_id, password, &user.sealed_secret_keys)?;
        self.session.begin(username, identity).await;
        Ok(())
    }

    /// Forgets the identity and cached public keys, then ends the provider
    /// session.
    pub async fn sign_out(&self) -> ClientResult<()> {
        self.session.clear().await;
        self.provider.sign_out().await?;
        info!("signed out");
        Ok(())
    }

    // ── Envelopes ──

    pub async fn seal(&self, item_id: &str, item: &Value, recipients: &[Recipient]) -> ClientResult<SealedItem> {
        let identity = self.session.identity().await?;
        Ok(keyshelf_crypto::seal(item_id, item, recipients, &identity)?)
    }

    pub async fn open(&self, envelope: &ItemEnvelope, record: &ItemKeyRecord) -> ClientResult<Value> {
        let identity = self.session.identity().await?;
        Ok(keyshelf_crypto::open(envelope, record, &identity)?)
    }

    // ── Sharing ──

    pub async fn share(&self, item_id: &str, user: &str, role: &str) -> ClientResult<()> {
        self.sharing.share(item_id, user, role).await
    }

    pub async fn revoke(&self, item_id: &str, user: &str) -> ClientResult<()> {
        self.sharing.revoke(item_id, user).await
    }

    pub async fn bulk_revoke(&self, user: &str, item_ids: &[String]) -> ClientResult<()> {
        self.sharing.bulk_revoke(user, item_ids).await
    }

    pub async fn update_role(&self, item_id: &str, user: &str, role: &str) -> ClientResult<()> {
        self.sharing.update_role(item_id, user, role).await
    }

    pub async fn transfer_ownership(&self, item_id: &str, user: &str, role: &str) -> ClientResult<()> {
        self.sharing.transfer_ownership(item_id, user, role).await
    }

    pub async fn bulk_create(&self, item_type: &str, items: Vec<CreateItem>) -> ClientResult<BulkCreateReport> {
        self.sharing.bulk_create(item_type, items).await
    }

    /// Replaces an item's content, keeping its key.
    pub async fn update_item(
        &self,
        item_id: &str,
        item: &Value,
        add_users: &[UserRole],
        remove_users: &[String],
    ) -> ClientResult<()> {
        self.sharing
            .update_item(item_id, item, add_users, remove_users)
            .await
    }

    pub async fn archive(&self, item_id: &str) -> ClientResult<()> {
        self.sharing.archive(item_id).await
    }

    pub async fn restore(&self, item_id: &str) -> ClientResult<()> {
        self.sharing.restore(item_id).await
    }

    // ── Key rotation ──

    pub async fn rekey(&self, old_password: &str, new_password: &str) -> ClientResult<RekeyReport> {
        self.rekey.rekey(old_password, new_password).await
    }

    /// Retries saving a rotation that failed with
    /// [`ClientError::RekeyNotPersisted`](crate::ClientError::RekeyNotPersisted).
    /// Returns `false` when no rotation was pending.
    pub async fn finish_rekey(&self, old_password: &str, new_password: &str) -> ClientResult<bool> {
        self.rekey.finish_pending(old_password, new_password).await
    }

    // ── Responses ──

    /// Decrypts every item in `response`, which was produced by `query`.
    pub async fn project_response(&self, response: Value, query: &QueryNode) -> ClientResult<Value> {
        let identity = self.session.identity().await?;
        Ok(self
            .projector
            .project(response, query, identity.encryption())
            .await)
    }

    // ── Files ──

    pub async fn upload_file(
        &self,
        item_id: &str,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
    ) -> ClientResult<UploadedFile> {
        self.files.upload(item_id, bytes, name, mime_type).await
    }

    pub async fn download_file(&self, file_id: &str) -> ClientResult<Vec<u8>> {
        self.files.download(file_id).await
    }

    pub async fn delete_file(&self, file_id: &str) -> ClientResult<bool> {
        self.files.delete(file_id).await
    }
}
