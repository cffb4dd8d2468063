//! Base64 helpers for key material that travels inside JSON bodies.

use crate::error::{CryptoError, CryptoResult};
use base64::{Engine, engine::general_purpose::STANDARD};

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(encoded: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))
}

/// Decodes a base64 string that must hold exactly `N` bytes.
pub fn decode_array<const N: usize>(encoded: &str) -> CryptoResult<[u8; N]> {
    let bytes = decode(encoded)?;
    if bytes.len() != N {
        return Err(CryptoError::InvalidKeyLength {
            expected: N,
            actual: bytes.len(),
        });
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
