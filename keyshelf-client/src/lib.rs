//! Keyshelf client.
//!
//! Client-side half of end-to-end encrypted item sharing:
//! - Session context holding the active identity and a public key cache
//! - Sharing workflows that re-wrap item keys instead of re-uploading data
//! - Password rotation that re-wraps every held key in bounded batches
//! - Query-aware decryption of encrypted response trees
//! - Encrypted file attachments via pre-signed URLs
//!
//! Network, identity, projection and blob storage are collaborators behind
//! traits; [`http`] provides reqwest-backed implementations.

pub mod api_client;
pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod projection;
pub mod projector;
pub mod public_keys;
pub mod query;
pub mod recipients;
pub mod rekey;
pub mod session;
pub mod sharing;
pub mod transport;
pub mod types;

pub use client::KeyshelfClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use files::UploadedFile;
pub use projection::{FieldProjector, ProjectionEngine};
pub use query::QueryNode;
pub use rekey::{RekeyReport, partition_batches};
pub use session::Session;
pub use sharing::{BulkCreateFailure, BulkCreateReport};
pub use transport::{ApiRequest, ApiResponse, BlobStore, IdentityProvider, Method, SignedInUser, Transport};
pub use types::*;
