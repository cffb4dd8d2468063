//! Client configuration.

use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};

/// Records per password-rotation batch; keeps request bodies under the
/// backend payload limit.
pub const DEFAULT_REKEY_BATCH_SIZE: usize = 5000;

/// Configuration for the Keyshelf client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL for the Keyshelf API (e.g., "https://api.keyshelf.io").
    pub api_base_url: String,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Number of item key records submitted per rotation batch.
    pub rekey_batch_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.keyshelf.io".to_string(),
            request_timeout_secs: 30,
            rekey_batch_size: DEFAULT_REKEY_BATCH_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(ClientError::Config("missing api_base_url".to_string()));
        }
        if self.rekey_batch_size == 0 {
            return Err(ClientError::Config(
                "rekey_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
