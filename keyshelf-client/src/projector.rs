//! Decrypts response trees shaped by a caller query.
//!
//! A node carrying `item` (ciphertext), `key` (wrapped item key) and
//! `publicKey` (wrapper public key) is opened in place and its plaintext is
//! run through the [`ProjectionEngine`] with the selection requested for
//! `item`. `users` entries exposing `{username, publicKey}` feed the
//! session's [`PublicKeyCache`]. Selections named `items` / `files` are
//! walked recursively under their response keys; lists are walked per
//! element in order.
//!
//! A node that cannot be decrypted loses its `item` field and the walk
//! continues.

use crate::error::{ClientError, ClientResult};
use crate::projection::ProjectionEngine;
use crate::public_keys::PublicKeyCache;
use crate::query::QueryNode;
use futures::future::{BoxFuture, FutureExt, join_all};
use keyshelf_crypto::{EncryptionKeyPair, open_wrapped};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ResponseProjector {
    projection: Arc<dyn ProjectionEngine>,
    cache: PublicKeyCache,
}

impl ResponseProjector {
    pub fn new(projection: Arc<dyn ProjectionEngine>, cache: PublicKeyCache) -> Self {
        Self { projection, cache }
    }

    /// Walks `response` against `query`, the selection that produced it.
    pub async fn project(&self, response: Value, query: &QueryNode, keys: &EncryptionKeyPair) -> Value {
        self.walk(response, query, keys).await
    }

    fn walk<'a>(
        &'a self,
        value: Value,
        query: &'a QueryNode,
        keys: &'a EncryptionKeyPair,
    ) -> BoxFuture<'a, Value> {
        async move {
            match value {
                Value::Array(elements) => {
                    let walked = join_all(elements.into_iter().map(|v| self.walk(v, query, keys))).await;
                    Value::Array(walked)
                }
                Value::Object(node) => Value::Object(self.walk_node(node, query, keys).await),
                other => other,
            }
        }
        .boxed()
    }

    async fn walk_node(
        &self,
        mut node: Map<String, Value>,
        query: &QueryNode,
        keys: &EncryptionKeyPair,
    ) -> Map<String, Value> {
        self.remember_users(&node).await;

        if node.get("item").is_some_and(|item| !item.is_null()) {
            match self.decrypt_and_project(&node, query, keys).await {
                Ok(item) => {
                    node.insert("item".to_string(), item);
                }
                Err(e) => {
                    warn!("dropping undecryptable item {}: {e}", node_id(&node));
                    node.remove("item");
                }
            }
        }

        let mut pending = Vec::new();
        for child in query.decryptable_children() {
            if let Some(value) = node.remove(child.response_key()) {
                pending.push((child.response_key().to_string(), self.walk(value, child, keys)));
            }
        }
        let (names, walks): (Vec<String>, Vec<_>) = pending.into_iter().unzip();
        for (name, value) in names.into_iter().zip(join_all(walks).await) {
            node.insert(name, value);
        }
        node
    }

    async fn decrypt_and_project(
        &self,
        node: &Map<String, Value>,
        query: &QueryNode,
        keys: &EncryptionKeyPair,
    ) -> ClientResult<Value> {
        let plain = open_node(node, keys)?;
        match query.child("item") {
            Some(selection) if !selection.is_leaf() => {
                let type_name = node.get("type").and_then(Value::as_str);
                self.projection.project(&plain, selection, type_name).await
            }
            _ => Ok(plain),
        }
    }

    async fn remember_users(&self, node: &Map<String, Value>) {
        let Some(Value::Array(users)) = node.get("users") else {
            return;
        };
        for user in users {
            let username = user.get("username").and_then(Value::as_str);
            let public_key = user.get("publicKey").and_then(Value::as_str);
            if let (Some(username), Some(public_key)) = (username, public_key) {
                if self.cache.insert(username, public_key).await {
                    debug!("cached public key for {username}");
                }
            }
        }
    }
}

/// Decrypts the `item` of a response node with its embedded `key` and
/// `publicKey`.
pub(crate) fn open_node(node: &Map<String, Value>, keys: &EncryptionKeyPair) -> ClientResult<Value> {
    let field = |name: &str| {
        node.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Decryption(format!("node has no `{name}`")))
    };
    Ok(open_wrapped(field("item")?, field("key")?, field("publicKey")?, keys)?)
}

fn node_id(node: &Map<String, Value>) -> &str {
    node.get("id").and_then(Value::as_str).unwrap_or("<unknown>")
}
