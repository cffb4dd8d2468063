//! Typed access to the Keyshelf backend endpoints.
//!
//! Every call fetches the current token from the identity provider and goes
//! through the [`Transport`] seam. Operation-specific status codes are mapped
//! here; anything left falls through to [`ApiResponse::error_for_status`].

use crate::error::{ClientError, ClientResult};
use crate::transport::{ApiRequest, ApiResponse, IdentityProvider, Transport};
use crate::types::*;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Client for the Keyshelf item, key and file endpoints.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentityProvider>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            transport,
            identity,
        }
    }

    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let token = self.identity.current_token().await?;
        debug!("{:?} {}", request.method, request.path);
        self.transport.send(request, &token).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: String, body: &B) -> ClientResult<ApiResponse> {
        self.send(ApiRequest::post(path, serde_json::to_value(body)?))
            .await
    }

    // ── Sharing ──

    /// Records the actor holds for `item_id`, plus the public key of `user`.
    pub async fn share_keys(&self, item_id: &str, user: &str) -> ClientResult<ShareKeysResponse> {
        let resp = self
            .post(format!("/keys/item/{item_id}/{user}"), &json!({}))
            .await?;
        let keys: ShareKeysResponse = resp.error_for_status()?.json()?;
        if keys.public_key.is_none() {
            return Err(ClientError::UserNotExisting(user.to_string()));
        }
        if keys.keys.is_empty() {
            return Err(ClientError::NotFound(format!("no readable key for item {item_id}")));
        }
        Ok(keys)
    }

    pub async fn submit_share(&self, req: &ShareRequest) -> ClientResult<()> {
        let resp = self.post("/share".to_string(), req).await?;
        match resp.status {
            400 => Err(ClientError::AlreadyShared),
            401 => Err(ClientError::RoleDoesNotExist),
            403 => Err(ClientError::Forbidden),
            s if (200..300).contains(&s) => Ok(()),
            status => Err(ClientError::unexpected(status, resp.message())),
        }
    }

    pub async fn revoke(&self, item_id: &str, user: &str) -> ClientResult<()> {
        let resp = self
            .send(ApiRequest::delete(format!("/keys/item/{item_id}/{user}")))
            .await?;
        match resp.status {
            404 => Err(ClientError::UserNotShared),
            _ => resp.error_for_status().map(|_| ()),
        }
    }

    pub async fn bulk_revoke(&self, user: &str, item_ids: &[String]) -> ClientResult<()> {
        let req = BulkRevokeRequest {
            item_ids: item_ids.to_vec(),
        };
        self.post(format!("/revoke/{user}"), &req)
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn update_role(&self, user: &str, item_id: &str, role: &str) -> ClientResult<()> {
        let req = UpdateRoleRequest {
            item_id: item_id.to_string(),
            role: role.to_string(),
        };
        let resp = self.post(format!("/role/{user}"), &req).await?;
        match resp.status {
            401 => Err(ClientError::RoleDoesNotExist),
            _ => resp.error_for_status().map(|_| ()),
        }
    }

    pub async fn transfer_ownership(&self, item_id: &str, user: &str, role: &str) -> ClientResult<()> {
        let req = TransferOwnershipRequest {
            user: user.to_string(),
            role: role.to_string(),
        };
        let resp = self.post(format!("/transfer/{item_id}"), &req).await?;
        match resp.status {
            404 => Err(ClientError::NotFound(format!("item {item_id}"))),
            400 => {
                let message = resp.message();
                if message.contains("User not shared") {
                    Err(ClientError::UserNotShared)
                } else if message.contains("Role not found") {
                    Err(ClientError::RoleDoesNotExist)
                } else {
                    Err(ClientError::unexpected(400, message))
                }
            }
            _ => resp.error_for_status().map(|_| ()),
        }
    }

    pub async fn archive(&self, item_id: &str) -> ClientResult<()> {
        self.post(format!("/archive/{item_id}"), &json!({}))
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn restore(&self, item_id: &str) -> ClientResult<()> {
        self.post(format!("/restore/{item_id}"), &json!({}))
            .await?
            .error_for_status()?;
        Ok(())
    }

    // ── Public keys ──

    /// Public keys of the named users. Unknown users are simply absent.
    pub async fn public_keys(&self, users: &[String]) -> ClientResult<Vec<UserPublicKey>> {
        self.post("/keys".to_string(), &json!({ "users": users }))
            .await?
            .error_for_status()?
            .json()
    }

    /// Everyone with access to `reference_id`, with the role they hold.
    pub async fn reference_keys(&self, reference_id: &str) -> ClientResult<Vec<UserPublicKey>> {
        self.post(format!("/keys/{reference_id}"), &json!({}))
            .await?
            .error_for_status()?
            .json()
    }

    /// Users holding one of `roles` on `reference_id`.
    pub async fn reference_role_keys(
        &self,
        reference_id: &str,
        roles: &[String],
    ) -> ClientResult<Vec<UserPublicKey>> {
        self.post(format!("/keys/roles/{reference_id}"), &json!({ "roles": roles }))
            .await?
            .error_for_status()?
            .json()
    }

    // ── Items ──

    /// Submits sealed items in one batch; returns the created item nodes.
    pub async fn create_items(&self, req: &BulkCreateRequest) -> ClientResult<Vec<Value>> {
        self.post("/create".to_string(), req)
            .await?
            .error_for_status()?
            .json()
    }

    /// The caller's record for `item_id` and the public keys of users an
    /// update adds.
    pub async fn update_keys(&self, item_id: &str, req: &UpdateKeysRequest) -> ClientResult<UpdateKeysResponse> {
        self.post(format!("/keys/{item_id}"), req)
            .await?
            .error_for_status()?
            .json()
    }

    pub async fn update_item(&self, item_id: &str, req: &UpdateItemRequest) -> ClientResult<()> {
        let resp = self.post(format!("/update/{item_id}"), req).await?;
        match resp.status {
            400 => Err(ClientError::AlreadyShared),
            401 => Err(ClientError::RoleDoesNotExist),
            _ => resp.error_for_status().map(|_| ()),
        }
    }

    // ── Key rotation ──

    pub async fn user_keys_page(&self, page: u32) -> ClientResult<UserKeysPage> {
        self.post("/keys/user".to_string(), &json!({ "page": page }))
            .await?
            .error_for_status()?
            .json()
    }

    pub async fn submit_rekey_batch(&self, req: &RekeyBatchRequest) -> ClientResult<()> {
        self.post("/auth/password".to_string(), req)
            .await?
            .error_for_status()?;
        Ok(())
    }

    // ── Files ──

    pub async fn register_file(&self, req: &FileUploadRequest) -> ClientResult<FileUploadResponse> {
        self.post("/file".to_string(), req)
            .await?
            .error_for_status()?
            .json()
    }

    pub async fn file(&self, file_id: &str) -> ClientResult<FileDownloadResponse> {
        self.send(ApiRequest::get(format!("/file/{file_id}")))
            .await?
            .error_for_status()?
            .json()
    }

    /// Returns `false` when the file did not exist.
    pub async fn delete_file(&self, file_id: &str) -> ClientResult<bool> {
        let resp = self
            .send(ApiRequest::delete(format!("/file/{file_id}")))
            .await?;
        match resp.status {
            404 => Ok(false),
            _ => resp.error_for_status().map(|_| true),
        }
    }
}
