//! Resource content transport encoding
//!
//! Content travels base64-encoded; in memory it is always raw bytes.

use super::error::DecodeError;
use base64::{engine::general_purpose::STANDARD, Engine};

/// Encode raw content for the wire
pub fn encode(content: &[u8]) -> String {
    STANDARD.encode(content)
}

/// Decode wire content back into raw bytes
pub fn decode(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(encoded)?)
}
