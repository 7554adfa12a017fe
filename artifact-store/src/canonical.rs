// Canonical JSON encoding and content hashing

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize with sorted object keys, pretty printed, newline terminated.
///
/// Going through `serde_json::Value` sorts keys, so two payloads with the
/// same content hash identically regardless of field order.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(payload)?;
    let mut bytes = serde_json::to_vec_pretty(&value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Lowercase hex sha256
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
