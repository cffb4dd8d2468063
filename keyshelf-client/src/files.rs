//! Encrypted file attachments.
//!
//! A file is sealed with its own item key for everyone who can access the
//! item it is attached to. The backend stores the metadata envelope and key
//! records; the raw ciphertext goes to a pre-signed URL via [`BlobStore`].

use crate::api_client::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use crate::transport::BlobStore;
use crate::types::{FileUploadRequest, UserPublicKey};
use keyshelf_crypto::{open_file, seal_file};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A file accepted by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    /// Storage key assigned by the backend.
    pub key: String,
}

pub struct FileManager {
    api: Arc<ApiClient>,
    blobs: Arc<dyn BlobStore>,
    session: Arc<Session>,
}

impl FileManager {
    pub fn new(api: Arc<ApiClient>, blobs: Arc<dyn BlobStore>, session: Arc<Session>) -> Self {
        Self {
            api,
            blobs,
            session,
        }
    }

    /// Seals `bytes` for everyone with access to `item_id` and uploads it.
    pub async fn upload(
        &self,
        item_id: &str,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
    ) -> ClientResult<UploadedFile> {
        let identity = self.session.identity().await?;

        let holders = self.api.reference_keys(item_id).await?;
        for holder in &holders {
            self.session
                .public_keys()
                .insert(&holder.username, &holder.public_key)
                .await;
        }
        let recipients: Vec<_> = holders.into_iter().map(UserPublicKey::into_recipient).collect();

        let id = Uuid::now_v7().to_string();
        let metadata = json!({ "name": name, "type": mime_type, "size": bytes.len() });
        let sealed = seal_file(&id, bytes, &metadata, &recipients, &identity)?;

        let mut records = sealed.metadata.key_records.into_iter();
        let owner = records
            .next()
            .ok_or_else(|| ClientError::unexpected(0, "sealed file has no owner record"))?;
        let stored = self
            .api
            .register_file(&FileUploadRequest {
                id: id.clone(),
                item_id: item_id.to_string(),
                item: sealed.metadata.envelope.ciphertext,
                keys: records.collect(),
                key: owner.wrapped_key,
                public_key: owner.wrapper_public_key,
            })
            .await?;

        let size = sealed.file_ciphertext.len();
        self.blobs.put(&stored.url, sealed.file_ciphertext).await?;
        info!("uploaded file {id} ({size} encrypted bytes) for item {item_id}");

        Ok(UploadedFile { id, key: stored.key })
    }

    /// Fetches and decrypts a file's contents.
    pub async fn download(&self, file_id: &str) -> ClientResult<Vec<u8>> {
        let identity = self.session.identity().await?;
        let file = self.api.file(file_id).await?;
        let (Some(url), Some(record)) = (file.url, file.key) else {
            return Err(ClientError::NotFound(format!("file {file_id}")));
        };

        let ciphertext = self.blobs.get(&url).await?;
        debug!("downloaded {} encrypted bytes for file {file_id}", ciphertext.len());
        Ok(open_file(&ciphertext, &record, &identity)?)
    }

    /// Returns `false` when there was nothing to delete.
    pub async fn delete(&self, file_id: &str) -> ClientResult<bool> {
        let deleted = self.api.delete_file(file_id).await?;
        if deleted {
            info!("deleted file {file_id}");
        }
        Ok(deleted)
    }
}
