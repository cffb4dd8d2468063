//! reqwest-backed implementations of [`Transport`] and [`BlobStore`].
//!
//! The backend expects the raw identity token in the `Authorization` header
//! and JSON bodies on every call. Responses are decoded as JSON when
//! possible; non-JSON bodies are kept as a string for error messages.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{ApiRequest, ApiResponse, BlobStore, Method, Transport};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP transport for the Keyshelf API.
pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest, token: &str) -> ClientResult<ApiResponse> {
        let url = self.url(&request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };

        let mut builder = builder.header(AUTHORIZATION, token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        debug!("{:?} {} -> {status} ({} bytes)", request.method, request.path, text.len());

        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse::new(status, body))
    }
}

/// Uploads and downloads file ciphertext through pre-signed URLs.
pub struct HttpBlobStore {
    client: Client,
}

impl HttpBlobStore {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, url: &str, bytes: Vec<u8>) -> ClientResult<()> {
        let size = bytes.len();
        let resp = self.client.put(url).body(bytes).send().await?;
        if !resp.status().is_success() {
            return Err(ClientError::unexpected(
                resp.status().as_u16(),
                "blob upload rejected",
            ));
        }
        debug!("uploaded {size} encrypted bytes");
        Ok(())
    }

    async fn get(&self, url: &str) -> ClientResult<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(ClientError::unexpected(
                resp.status().as_u16(),
                "blob download rejected",
            ));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
