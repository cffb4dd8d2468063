//! In-memory Keyshelf backend shared by the integration tests.
//!
//! Implements [`Transport`] and [`BlobStore`] over a single mutable state,
//! enforcing the same ownership and role rules the real backend reports via
//! status codes. The bearer token is simply the username.

#![allow(dead_code)]

use async_trait::async_trait;
use keyshelf_client::*;
use keyshelf_crypto::{Identity, ItemKeyRecord};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

struct Account {
    login: String,
    password: String,
    sealed_secret_keys: String,
    public_key: String,
}

struct StoredItem {
    owner: String,
    ciphertext: String,
    roles: Vec<String>,
    writable_roles: Vec<String>,
    item_type: String,
    archived: bool,
}

struct StoredFile {
    url: String,
}

struct State {
    accounts: HashMap<String, Account>,
    items: HashMap<String, StoredItem>,
    records: Vec<ItemKeyRecord>,
    files: HashMap<String, StoredFile>,
    blobs: HashMap<String, Vec<u8>>,
    requests: Vec<(Method, String)>,
    rekey_batches: Vec<usize>,
    fail_rekey_batch: Option<usize>,
    fail_update_password: usize,
    fail_store_secret_keys: usize,
    page_size: usize,
}

pub struct FakeBackend {
    state: Mutex<State>,
}

fn respond(status: u16, body: Value) -> ApiResponse {
    ApiResponse::new(status, body)
}

fn ok(body: Value) -> ApiResponse {
    respond(200, body)
}

fn is_update_lookup(body: &Option<Value>) -> bool {
    body.as_ref()
        .is_some_and(|b| b.get("addUsers").is_some() || b.get("removeUsers").is_some())
}

fn parse<T: DeserializeOwned>(body: Option<Value>) -> T {
    serde_json::from_value(body.unwrap_or(Value::Null)).expect("request body must match wire type")
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                accounts: HashMap::new(),
                items: HashMap::new(),
                records: Vec::new(),
                files: HashMap::new(),
                blobs: HashMap::new(),
                requests: Vec::new(),
                rekey_batches: Vec::new(),
                fail_rekey_batch: None,
                fail_update_password: 0,
                fail_store_secret_keys: 0,
                page_size: DEFAULT_PAGE_SIZE,
            }),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("backend state poisoned")
    }

    // ── Test setup ──

    pub fn register(&self, identity: &Identity, password: &str) {
        let sealed = identity.seal_secret_keys(password).expect("seal secret keys");
        self.state().accounts.insert(
            identity.user_id().to_string(),
            Account {
                login: identity.user_id().to_string(),
                password: password.to_string(),
                sealed_secret_keys: sealed,
                public_key: identity.public_key(),
            },
        );
    }

    /// Makes `login` the only name `user` can sign in with.
    pub fn set_login(&self, user: &str, login: &str) {
        if let Some(account) = self.state().accounts.get_mut(user) {
            account.login = login.to_string();
        }
    }

    pub fn insert_records(&self, records: Vec<ItemKeyRecord>) {
        self.state().records.extend(records);
    }

    pub fn set_page_size(&self, size: usize) {
        self.state().page_size = size;
    }

    /// Rejects the `index`-th rotation batch received (0-based).
    pub fn fail_rekey_batch(&self, index: usize) {
        self.state().fail_rekey_batch = Some(index);
    }

    /// The next `times` password changes fail with a 503.
    pub fn fail_update_password(&self, times: usize) {
        self.state().fail_update_password = times;
    }

    /// The next `times` secret key uploads fail with a 503.
    pub fn fail_store_secret_keys(&self, times: usize) {
        self.state().fail_store_secret_keys = times;
    }

    // ── Inspection ──

    pub fn public_key(&self, user: &str) -> Option<String> {
        self.state().accounts.get(user).map(|a| a.public_key.clone())
    }

    pub fn password(&self, user: &str) -> Option<String> {
        self.state().accounts.get(user).map(|a| a.password.clone())
    }

    pub fn record(&self, item_id: &str, user: &str) -> Option<ItemKeyRecord> {
        self.state()
            .records
            .iter()
            .find(|r| r.item_id == item_id && r.recipient_user_id == user)
            .cloned()
    }

    pub fn records_for(&self, user: &str) -> Vec<ItemKeyRecord> {
        self.state()
            .records
            .iter()
            .filter(|r| r.recipient_user_id == user)
            .cloned()
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    pub fn owner(&self, item_id: &str) -> Option<String> {
        self.state().items.get(item_id).map(|i| i.owner.clone())
    }

    pub fn is_archived(&self, item_id: &str) -> bool {
        self.state().items.get(item_id).is_some_and(|i| i.archived)
    }

    pub fn rekey_batches(&self) -> Vec<usize> {
        self.state().rekey_batches.clone()
    }

    pub fn sealed_secret_keys(&self, user: &str) -> Option<String> {
        self.state()
            .accounts
            .get(user)
            .map(|a| a.sealed_secret_keys.clone())
    }

    pub fn blob(&self, url: &str) -> Option<Vec<u8>> {
        self.state().blobs.get(url).cloned()
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> usize {
        self.state().requests.iter().filter(|(_, p)| p == path).count()
    }

    /// The item as `user` would receive it in a query response.
    pub fn node_for(&self, item_id: &str, user: &str) -> Value {
        let state = self.state();
        let item = &state.items[item_id];
        let mut node = json!({
            "id": item_id,
            "type": item.item_type,
            "item": item.ciphertext,
        });
        if let Some(record) = state
            .records
            .iter()
            .find(|r| r.item_id == item_id && r.recipient_user_id == user)
        {
            node["key"] = json!(record.wrapped_key);
            node["publicKey"] = json!(record.wrapper_public_key);
        }
        node
    }

    /// Replaces an item's ciphertext, e.g. to simulate corruption.
    pub fn set_ciphertext(&self, item_id: &str, ciphertext: &str) {
        if let Some(item) = self.state().items.get_mut(item_id) {
            item.ciphertext = ciphertext.to_string();
        }
    }

    fn route(&self, request: ApiRequest, actor: &str) -> ApiResponse {
        let mut state = self.state();
        state.requests.push((request.method, request.path.clone()));

        let path = request.path.clone();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let body = request.body;

        match (request.method, segments.as_slice()) {
            (Method::Post, ["keys", "item", item_id, user]) => state.share_keys(actor, item_id, user),
            (Method::Delete, ["keys", "item", item_id, user]) => state.revoke(actor, item_id, user),
            (Method::Post, ["keys", "user"]) => {
                let page = parse::<Value>(body)["page"].as_u64().unwrap_or(1) as usize;
                state.user_keys(actor, page)
            }
            (Method::Post, ["keys", "roles", reference]) => {
                let roles: Vec<String> =
                    serde_json::from_value(parse::<Value>(body)["roles"].clone()).unwrap_or_default();
                state.reference_keys(reference, Some(roles.as_slice()))
            }
            (Method::Post, ["keys", item_id]) if is_update_lookup(&body) => {
                state.update_keys(actor, item_id, parse(body))
            }
            (Method::Post, ["keys", reference]) => state.reference_keys(reference, None),
            (Method::Post, ["keys"]) => {
                let users: Vec<String> =
                    serde_json::from_value(parse::<Value>(body)["users"].clone()).unwrap_or_default();
                state.public_keys(&users)
            }
            (Method::Post, ["share"]) => state.share(actor, parse(body)),
            (Method::Post, ["revoke", user]) => state.bulk_revoke(actor, user, parse(body)),
            (Method::Post, ["role", user]) => state.update_role(actor, user, parse(body)),
            (Method::Post, ["transfer", item_id]) => state.transfer(actor, item_id, parse(body)),
            (Method::Post, ["archive", item_id]) => state.set_archived(actor, item_id, true),
            (Method::Post, ["restore", item_id]) => state.set_archived(actor, item_id, false),
            (Method::Post, ["create"]) => state.create(actor, parse(body)),
            (Method::Post, ["update", item_id]) => state.update_item(actor, item_id, parse(body)),
            (Method::Post, ["auth", "password"]) => state.rotate(actor, parse(body)),
            (Method::Post, ["file"]) => state.register_file(actor, parse(body)),
            (Method::Get, ["file", file_id]) => state.file(actor, file_id),
            (Method::Delete, ["file", file_id]) => state.delete_file(file_id),
            _ => respond(404, json!("no such route")),
        }
    }
}

impl State {
    fn record_index(&self, item_id: &str, user: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.item_id == item_id && r.recipient_user_id == user)
    }

    fn share_keys(&self, actor: &str, item_id: &str, user: &str) -> ApiResponse {
        if !self.items.contains_key(item_id) {
            return respond(404, json!("Item not found."));
        }
        let keys: Vec<&ItemKeyRecord> = self
            .records
            .iter()
            .filter(|r| r.item_id == item_id && r.recipient_user_id == actor)
            .collect();
        if keys.is_empty() {
            return respond(403, json!("Forbidden"));
        }
        let public_key = self.accounts.get(user).map(|a| a.public_key.clone());
        ok(json!({ "keys": keys, "publicKey": public_key }))
    }

    fn share(&mut self, actor: &str, req: ShareRequest) -> ApiResponse {
        let Some(item) = self.items.get(&req.item_id) else {
            return respond(404, json!("Item not found."));
        };
        if self.record_index(&req.item_id, actor).is_none() {
            return respond(403, json!("Forbidden"));
        }
        if self.record_index(&req.item_id, &req.user).is_some() {
            return respond(400, json!("Already shared"));
        }
        let undeclared = req
            .keys
            .iter()
            .any(|k| k.role.as_ref().is_none_or(|role| !item.roles.contains(role)));
        if undeclared {
            return respond(401, json!("Role does not exist"));
        }
        self.records.extend(req.keys);
        ok(json!("ok"))
    }

    fn revoke(&mut self, actor: &str, item_id: &str, user: &str) -> ApiResponse {
        match self.items.get(item_id) {
            None => return respond(404, json!("Item not found.")),
            Some(item) if item.owner != actor => return respond(403, json!("Forbidden")),
            Some(_) => {}
        }
        match self.record_index(item_id, user) {
            Some(index) => {
                self.records.remove(index);
                ok(json!("ok"))
            }
            None => respond(404, json!("User not shared")),
        }
    }

    fn bulk_revoke(&mut self, actor: &str, user: &str, req: BulkRevokeRequest) -> ApiResponse {
        let owned: Vec<&String> = req
            .item_ids
            .iter()
            .filter(|id| self.items.get(id.as_str()).is_some_and(|i| i.owner == actor))
            .collect();
        if owned.len() != req.item_ids.len() {
            return respond(403, json!("Forbidden"));
        }
        self.records
            .retain(|r| r.recipient_user_id != user || !req.item_ids.contains(&r.item_id));
        ok(json!("ok"))
    }

    fn update_role(&mut self, actor: &str, user: &str, req: UpdateRoleRequest) -> ApiResponse {
        let Some(item) = self.items.get(&req.item_id) else {
            return respond(404, json!("Item not found."));
        };
        if item.owner != actor {
            return respond(403, json!("Forbidden"));
        }
        if !item.roles.contains(&req.role) {
            return respond(401, json!("Role does not exist"));
        }
        match self.record_index(&req.item_id, user) {
            Some(index) => {
                self.records[index].role = Some(req.role);
                ok(json!("ok"))
            }
            None => respond(404, json!("User not shared")),
        }
    }

    fn transfer(&mut self, actor: &str, item_id: &str, req: TransferOwnershipRequest) -> ApiResponse {
        let Some(item) = self.items.get(item_id) else {
            return respond(404, json!("Item not found."));
        };
        if item.owner != actor {
            return respond(403, json!("Forbidden"));
        }
        if self.record_index(item_id, &req.user).is_none() {
            return respond(400, json!("User not shared"));
        }
        if !item.roles.contains(&req.role) {
            return respond(400, json!("Role not found"));
        }
        if let Some(index) = self.record_index(item_id, actor) {
            self.records[index].role = Some(req.role);
        }
        if let Some(item) = self.items.get_mut(item_id) {
            item.owner = req.user;
        }
        ok(json!("ok"))
    }

    fn set_archived(&mut self, actor: &str, item_id: &str, archived: bool) -> ApiResponse {
        match self.items.get_mut(item_id) {
            None => respond(404, json!("Item not found.")),
            Some(item) if item.owner != actor => respond(403, json!("Forbidden")),
            Some(item) => {
                item.archived = archived;
                ok(json!("ok"))
            }
        }
    }

    fn public_keys(&self, users: &[String]) -> ApiResponse {
        let keys: Vec<Value> = users
            .iter()
            .filter_map(|u| {
                self.accounts
                    .get(u)
                    .map(|a| json!({ "username": u, "publicKey": a.public_key }))
            })
            .collect();
        ok(json!(keys))
    }

    fn reference_keys(&self, reference: &str, roles: Option<&[String]>) -> ApiResponse {
        if !self.items.contains_key(reference) {
            return respond(404, json!("Item not found."));
        }
        let keys: Vec<Value> = self
            .records
            .iter()
            .filter(|r| r.item_id == reference)
            .filter(|r| match (roles, &r.role) {
                (None, _) => true,
                (Some(roles), Some(role)) => roles.contains(role),
                (Some(_), None) => false,
            })
            .map(|r| {
                json!({
                    "username": r.recipient_user_id,
                    "publicKey": self.accounts[&r.recipient_user_id].public_key,
                    "role": r.role,
                })
            })
            .collect();
        ok(json!(keys))
    }

    fn update_keys(&self, actor: &str, item_id: &str, req: UpdateKeysRequest) -> ApiResponse {
        if !self.items.contains_key(item_id) {
            return respond(404, json!("Item not found."));
        }
        let Some(index) = self.record_index(item_id, actor) else {
            return respond(403, json!("Forbidden"));
        };
        let users: Vec<Value> = req
            .add_users
            .iter()
            .filter_map(|u| {
                self.accounts.get(&u.username).map(|a| {
                    json!({ "username": u.username, "publicKey": a.public_key, "role": u.role })
                })
            })
            .collect();
        ok(json!({ "key": self.records[index], "users": users }))
    }

    fn update_item(&mut self, actor: &str, item_id: &str, req: UpdateItemRequest) -> ApiResponse {
        let Some(item) = self.items.get(item_id) else {
            return respond(404, json!("Item not found."));
        };
        let Some(index) = self.record_index(item_id, actor) else {
            return respond(403, json!("Forbidden"));
        };
        let writable = item.owner == actor
            || self.records[index]
                .role
                .as_ref()
                .is_some_and(|role| item.writable_roles.contains(role));
        if !writable || req.remove_users.contains(&item.owner) {
            return respond(403, json!("Forbidden"));
        }
        if req
            .user_keys
            .iter()
            .any(|k| self.record_index(item_id, &k.recipient_user_id).is_some())
        {
            return respond(400, json!("Already shared"));
        }
        if req
            .user_keys
            .iter()
            .any(|k| k.role.as_ref().is_none_or(|role| !item.roles.contains(role)))
        {
            return respond(401, json!("Role does not exist"));
        }

        self.records
            .retain(|r| r.item_id != item_id || !req.remove_users.contains(&r.recipient_user_id));
        self.records.extend(req.user_keys);
        if let Some(item) = self.items.get_mut(item_id) {
            item.ciphertext = req.item;
        }
        ok(json!("ok"))
    }

    fn create(&mut self, actor: &str, req: BulkCreateRequest) -> ApiResponse {
        let mut created = Vec::with_capacity(req.items.len());
        for item in req.items {
            self.records.push(ItemKeyRecord {
                item_id: item.id.clone(),
                recipient_user_id: actor.to_string(),
                recipient_public_key: item.public_key.clone(),
                wrapper_public_key: item.public_key.clone(),
                wrapped_key: item.key.clone(),
                role: item.roles.first().map(|r| r.name.clone()),
                item_type: Some(req.item_type.clone()),
            });
            self.records.extend(item.user_keys.into_iter().map(|mut r| {
                r.item_type = Some(req.item_type.clone());
                r
            }));
            created.push(json!({
                "id": item.id,
                "type": req.item_type,
                "item": item.item,
                "key": item.key,
                "publicKey": item.public_key,
            }));
            self.items.insert(
                item.id,
                StoredItem {
                    owner: actor.to_string(),
                    ciphertext: item.item,
                    writable_roles: item
                        .roles
                        .iter()
                        .filter(|r| r.update)
                        .map(|r| r.name.clone())
                        .collect(),
                    roles: item.roles.into_iter().map(|r| r.name).collect(),
                    item_type: req.item_type.clone(),
                    archived: false,
                },
            );
        }
        ok(json!(created))
    }

    fn user_keys(&self, actor: &str, page: usize) -> ApiResponse {
        let held: Vec<&ItemKeyRecord> = self
            .records
            .iter()
            .filter(|r| r.recipient_user_id == actor)
            .collect();
        let total_pages = held.len().div_ceil(self.page_size).max(1);
        let keys: Vec<&ItemKeyRecord> = held
            .into_iter()
            .skip((page - 1) * self.page_size)
            .take(self.page_size)
            .collect();
        ok(json!({ "keys": keys, "totalPages": total_pages }))
    }

    fn rotate(&mut self, actor: &str, req: RekeyBatchRequest) -> ApiResponse {
        let index = self.rekey_batches.len();
        self.rekey_batches.push(req.encrypted_item_keys.len());
        if self.fail_rekey_batch == Some(index) {
            return respond(500, json!("batch rejected"));
        }

        let positions: HashMap<(String, String), usize> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.item_id.clone(), r.recipient_user_id.clone()), i))
            .collect();
        for record in req.encrypted_item_keys {
            let key = (record.item_id.clone(), record.recipient_user_id.clone());
            if let Some(&i) = positions.get(&key) {
                self.records[i] = record;
            }
        }
        if let Some(account) = self.accounts.get_mut(actor) {
            account.public_key = req.encryption_public_key;
        }
        ok(json!("ok"))
    }

    fn register_file(&mut self, actor: &str, req: FileUploadRequest) -> ApiResponse {
        if self.record_index(&req.item_id, actor).is_none() {
            return respond(403, json!("Forbidden"));
        }
        self.records.push(ItemKeyRecord {
            item_id: req.id.clone(),
            recipient_user_id: actor.to_string(),
            recipient_public_key: req.public_key.clone(),
            wrapper_public_key: req.public_key,
            wrapped_key: req.key,
            role: None,
            item_type: Some("file".to_string()),
        });
        self.records.extend(req.keys);

        let url = format!("mem://blobs/{}", req.id);
        self.files.insert(req.id.clone(), StoredFile { url: url.clone() });
        ok(json!({ "url": url, "key": req.id }))
    }

    fn file(&self, actor: &str, file_id: &str) -> ApiResponse {
        let Some(file) = self.files.get(file_id) else {
            return respond(404, json!("File not found."));
        };
        let key = self
            .records
            .iter()
            .find(|r| r.item_id == file_id && r.recipient_user_id == actor);
        ok(json!({ "url": file.url, "key": key }))
    }

    fn delete_file(&mut self, file_id: &str) -> ApiResponse {
        match self.files.remove(file_id) {
            Some(file) => {
                self.blobs.remove(&file.url);
                self.records.retain(|r| r.item_id != file_id);
                ok(json!("ok"))
            }
            None => respond(404, json!("File not found.")),
        }
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: ApiRequest, token: &str) -> ClientResult<ApiResponse> {
        Ok(self.route(request, token))
    }
}

#[async_trait]
impl BlobStore for FakeBackend {
    async fn put(&self, url: &str, bytes: Vec<u8>) -> ClientResult<()> {
        self.state().blobs.insert(url.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, url: &str) -> ClientResult<Vec<u8>> {
        self.state()
            .blobs
            .get(url)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(url.to_string()))
    }
}

/// Identity provider backed by the fake accounts. One per signed-in user.
pub struct FakeProvider {
    backend: Arc<FakeBackend>,
    user: Mutex<Option<String>>,
}

impl FakeProvider {
    pub fn new(backend: Arc<FakeBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            user: Mutex::new(None),
        })
    }

    fn user(&self) -> ClientResult<String> {
        self.user
            .lock()
            .expect("provider state poisoned")
            .clone()
            .ok_or(ClientError::NotSignedIn)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn sign_in(&self, username: &str, password: &str) -> ClientResult<SignedInUser> {
        let state = self.backend.state();
        let (user_id, account) = state
            .accounts
            .iter()
            .find(|(_, a)| a.login == username && a.password == password)
            .ok_or_else(|| ClientError::unexpected(401, "invalid credentials"))?;
        let user = SignedInUser {
            user_id: user_id.clone(),
            sealed_secret_keys: account.sealed_secret_keys.clone(),
        };
        *self.user.lock().expect("provider state poisoned") = Some(user_id.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> ClientResult<()> {
        *self.user.lock().expect("provider state poisoned") = None;
        Ok(())
    }

    async fn current_token(&self) -> ClientResult<String> {
        self.user()
    }

    async fn update_password(&self, old_password: &str, new_password: &str) -> ClientResult<()> {
        let user = self.user()?;
        let mut state = self.backend.state();
        if state.fail_update_password > 0 {
            state.fail_update_password -= 1;
            return Err(ClientError::unexpected(503, "identity service unavailable"));
        }
        let account = state
            .accounts
            .get_mut(&user)
            .filter(|a| a.password == old_password)
            .ok_or_else(|| ClientError::unexpected(401, "invalid credentials"))?;
        account.password = new_password.to_string();
        Ok(())
    }

    async fn store_secret_keys(&self, sealed: &str) -> ClientResult<()> {
        let user = self.user()?;
        let mut state = self.backend.state();
        if state.fail_store_secret_keys > 0 {
            state.fail_store_secret_keys -= 1;
            return Err(ClientError::unexpected(503, "identity service unavailable"));
        }
        if let Some(account) = state.accounts.get_mut(&user) {
            account.sealed_secret_keys = sealed.to_string();
        }
        Ok(())
    }
}

// ─────────────────────── helpers ───────────────────────

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn password_for(user: &str) -> String {
    format!("{user}-correct-horse")
}

pub fn client_with_config(backend: &Arc<FakeBackend>, config: ClientConfig) -> KeyshelfClient {
    KeyshelfClient::new(
        config,
        backend.clone(),
        FakeProvider::new(backend.clone()),
        Arc::new(FieldProjector),
        backend.clone(),
    )
    .expect("valid client config")
}

/// Registers a fresh identity for `user` and returns a signed-in client.
pub async fn sign_up(backend: &Arc<FakeBackend>, user: &str) -> (KeyshelfClient, Identity) {
    sign_up_with_config(backend, user, ClientConfig::default()).await
}

pub async fn sign_up_with_config(
    backend: &Arc<FakeBackend>,
    user: &str,
    config: ClientConfig,
) -> (KeyshelfClient, Identity) {
    init_tracing();
    let identity = Identity::generate(user);
    backend.register(&identity, &password_for(user));

    let client = client_with_config(backend, config);
    client
        .sign_in(user, &password_for(user))
        .await
        .expect("sign in");
    (client, identity)
}

/// Roles every test note declares.
pub fn note_roles() -> Vec<Role> {
    vec![Role::full("owner"), Role::full("editor"), Role::viewer("viewer")]
}

/// Creates a `{"text": text}` note owned by the client's user.
pub async fn create_note(client: &KeyshelfClient, text: &str) -> String {
    let report = client
        .bulk_create(
            "note",
            vec![CreateItem::new(json!({ "text": text })).with_roles(note_roles())],
        )
        .await
        .expect("bulk create");
    assert!(report.failures.is_empty());
    report.created[0]["id"]
        .as_str()
        .expect("created id")
        .to_string()
}

/// `{ items { item { text } } }`
pub fn notes_query() -> QueryNode {
    QueryNode::new("query").with_child(QueryNode::field(
        "items",
        [
            QueryNode::new("id"),
            QueryNode::field("item", [QueryNode::new("text")]),
        ],
    ))
}

/// Decrypts the given items as `client` sees them and returns the `item`
/// values (`None` when undecryptable).
pub async fn read_notes(
    backend: &FakeBackend,
    client: &KeyshelfClient,
    user: &str,
    item_ids: &[&str],
) -> Vec<Option<Value>> {
    let nodes: Vec<Value> = item_ids.iter().map(|id| backend.node_for(id, user)).collect();
    let out = client
        .project_response(json!({ "items": nodes }), &notes_query())
        .await
        .expect("project response");
    out["items"]
        .as_array()
        .expect("items list")
        .iter()
        .map(|node| node.get("item").cloned())
        .collect()
}
