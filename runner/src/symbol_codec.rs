//! Repeating-key XOR transform used to keep private symbol names out of the
//! binary's string table.
//!
//! This is obfuscation, not encryption. The transform is its own inverse, so
//! the same function produces the stored constants and recovers the names.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("obfuscation key is empty")]
    EmptyKey,
    #[error("decoded bytes are not valid UTF-8 (first bad byte at offset {offset})")]
    InvalidText { offset: usize },
}

/// `out[i] = bytes[i] ^ key[i % key.len()]`. Returns an empty vector for an
/// empty key; callers that need the error go through [`decode`] or [`encode`].
pub fn xor_cyclic(bytes: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return Vec::new();
    }
    bytes
        .iter()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

pub fn decode(bytes: &[u8], key: &[u8]) -> Result<String, DecodeError> {
    if key.is_empty() {
        return Err(DecodeError::EmptyKey);
    }
    String::from_utf8(xor_cyclic(bytes, key)).map_err(|e| DecodeError::InvalidText {
        offset: e.utf8_error().valid_up_to(),
    })
}

#[allow(dead_code)]
pub fn encode(text: &str, key: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if key.is_empty() {
        return Err(DecodeError::EmptyKey);
    }
    Ok(xor_cyclic(text.as_bytes(), key))
}
