//! Collaborator seams: backend transport, identity provider and blob store.
//!
//! The core never talks HTTP directly. Everything goes through
//! [`Transport::send`], so tests substitute in-memory backends and the
//! production client plugs in [`crate::http::HttpTransport`].

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// A JSON request to the backend.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// A backend response: status plus JSON body (`Null` when empty, a JSON
/// string when the body was not JSON).
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body rendered for diagnostics and for string-coded backend errors.
    pub fn message(&self) -> String {
        match &self.body {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Maps the generic backend statuses; operation-specific codes must be
    /// matched before calling this.
    pub fn error_for_status(self) -> ClientResult<Self> {
        match self.status {
            s if (200..300).contains(&s) => Ok(self),
            401 => Err(ClientError::NotSignedIn),
            403 => Err(ClientError::Forbidden),
            404 => Err(ClientError::NotFound(self.message())),
            status => Err(ClientError::unexpected(status, self.message())),
        }
    }

    pub fn json<T: DeserializeOwned>(self) -> ClientResult<T> {
        Ok(serde_json::from_value(self.body)?)
    }
}

/// Sends JSON requests to the backend on behalf of a signed-in user.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest, token: &str) -> ClientResult<ApiResponse>;
}

/// What the identity provider hands back after a successful sign-in.
#[derive(Clone, Debug)]
pub struct SignedInUser {
    pub user_id: String,
    /// Secret keys sealed under the password-derived key.
    pub sealed_secret_keys: String,
}

/// Sign-in, session tokens and storage of the password-sealed secret keys.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, username: &str, password: &str) -> ClientResult<SignedInUser>;

    async fn sign_out(&self) -> ClientResult<()>;

    /// Current bearer token, refreshed by the provider when needed.
    async fn current_token(&self) -> ClientResult<String>;

    async fn update_password(&self, old_password: &str, new_password: &str) -> ClientResult<()>;

    /// Replaces the persisted password-sealed secret key blob.
    async fn store_secret_keys(&self, sealed: &str) -> ClientResult<()>;
}

/// Moves encrypted file bytes to and from pre-signed URLs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, url: &str, bytes: Vec<u8>) -> ClientResult<()>;

    async fn get(&self, url: &str) -> ClientResult<Vec<u8>>;
}
