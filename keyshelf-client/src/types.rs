//! Wire types exchanged with the Keyshelf backend.

use keyshelf_crypto::{ItemKeyRecord, Recipient};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A role declared on an item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub reference: bool,
}

impl Role {
    /// A role with every permission.
    pub fn full(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view: true,
            update: true,
            delete: true,
            reference: true,
        }
    }

    pub fn viewer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view: true,
            update: false,
            delete: false,
            reference: false,
        }
    }
}

/// A user and the role they should receive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub username: String,
    pub role: String,
}

impl UserRole {
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
        }
    }
}

/// A user's published encryption key, optionally with the role they hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublicKey {
    pub username: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserPublicKey {
    pub fn new(username: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            public_key: public_key.into(),
            role: None,
        }
    }

    pub fn into_recipient(self) -> Recipient {
        Recipient {
            user_id: self.username,
            public_key: self.public_key,
            role: self.role,
        }
    }
}

/// Existing records for an item plus the share target's public key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareKeysResponse {
    #[serde(default)]
    pub keys: Vec<ItemKeyRecord>,
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub keys: Vec<ItemKeyRecord>,
    pub item_id: String,
    pub user: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRevokeRequest {
    pub item_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub item_id: String,
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferOwnershipRequest {
    pub user: String,
    pub role: String,
}

/// One page of the records a user holds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserKeysPage {
    #[serde(default)]
    pub keys: Vec<ItemKeyRecord>,
    #[serde(default = "one")]
    pub total_pages: u32,
}

fn one() -> u32 {
    1
}

/// One password-rotation batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RekeyBatchRequest {
    pub encryption_public_key: String,
    pub encrypted_item_keys: Vec<ItemKeyRecord>,
}

/// Lookup posted to `/keys/{itemId}` ahead of an item update.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKeysRequest {
    pub add_users: Vec<UserRole>,
    pub remove_users: Vec<String>,
}

/// The caller's record for the item plus the public keys of the users
/// being added. Unknown users are absent from `users`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKeysResponse {
    #[serde(default)]
    pub key: Option<ItemKeyRecord>,
    #[serde(default)]
    pub users: Vec<UserPublicKey>,
}

/// New ciphertext for an existing item, under its existing key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub item: String,
    pub user_keys: Vec<ItemKeyRecord>,
    pub remove_users: Vec<String>,
}

/// A plaintext item to create, with the recipients it should be sealed for.
///
/// Recipients come from `users` if any are given, otherwise from a single
/// `reference_ids` entry (filtered by `shared_roles` when present).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItem {
    pub item: Value,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub users: Vec<UserRole>,
    #[serde(default)]
    pub reference_ids: Vec<String>,
    #[serde(default)]
    pub shared_roles: Vec<String>,
}

impl CreateItem {
    pub fn new(item: Value) -> Self {
        Self {
            item,
            ..Self::default()
        }
    }

    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_users(mut self, users: Vec<UserRole>) -> Self {
        self.users = users;
        self
    }

    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_ids = vec![reference_id.into()];
        self
    }

    pub fn with_shared_roles(mut self, roles: Vec<String>) -> Self {
        self.shared_roles = roles;
        self
    }
}

/// An item as submitted to `/create`: ciphertext, the owner's wrapped key
/// and one record per additional recipient.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedItem {
    pub id: String,
    pub item: String,
    pub key: String,
    pub public_key: String,
    pub user_keys: Vec<ItemKeyRecord>,
    pub roles: Vec<Role>,
    pub reference_ids: Vec<String>,
    pub shared_roles: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateRequest {
    pub items: Vec<EncryptedItem>,
    pub item_type: String,
}

/// Body posted to `/file` ahead of the blob upload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadRequest {
    pub id: String,
    pub item_id: String,
    pub item: String,
    pub keys: Vec<ItemKeyRecord>,
    pub key: String,
    pub public_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileUploadResponse {
    pub url: String,
    pub key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileDownloadResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub key: Option<ItemKeyRecord>,
}
