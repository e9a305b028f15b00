//! High level: AES-256-GCM over an integrity-wrapped plaintext.
//!
//! Before encryption the plaintext is wrapped as
//!
//! ```text
//! [ len(ts), u32 BE (4) ][ ts, RFC 3339 ][ SHA-256(plaintext) (32) ][ plaintext ]
//! ```
//!
//! and the result is sealed exactly like the standard level. After the GCM
//! tag verifies, the hash is recomputed over the recovered plaintext; a
//! mismatch fails with `Integrity` even though the tag passed.

use chrono::Utc;

use crate::crypto::{self, DIGEST_LEN};
use crate::error::{EngineError, EngineResult};
use crate::keys::WorkingKey;
use crate::metadata::{algorithm_id, AlgorithmFields, EncryptionLevel};
use crate::strategy::standard::{open_gcm, seal_gcm};
use crate::strategy::{ensure_non_empty, EncryptAlgorithm};

#[derive(Debug, Clone, Copy, Default)]
pub struct HighStrategy;

fn wrap(plaintext: &[u8]) -> Vec<u8> {
    let timestamp = Utc::now().to_rfc3339();
    let ts = timestamp.as_bytes();
    let mut out = Vec::with_capacity(4 + ts.len() + DIGEST_LEN + plaintext.len());
    out.extend_from_slice(&(ts.len() as u32).to_be_bytes());
    out.extend_from_slice(ts);
    out.extend_from_slice(&crypto::sha256(plaintext));
    out.extend_from_slice(plaintext);
    out
}

/// Split a wrapped buffer and verify its embedded hash.
fn unwrap(wrapped: &[u8]) -> EngineResult<Vec<u8>> {
    let len_bytes: [u8; 4] = wrapped
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(EngineError::Integrity)?;
    let ts_len = u32::from_be_bytes(len_bytes) as usize;

    let hash_start = 4usize.checked_add(ts_len).ok_or(EngineError::Integrity)?;
    let body_start = hash_start + DIGEST_LEN;
    if wrapped.len() < body_start {
        return Err(EngineError::Integrity);
    }

    let embedded = &wrapped[hash_start..body_start];
    let original = &wrapped[body_start..];
    if !crypto::constant_time_eq(embedded, &crypto::sha256(original)) {
        return Err(EngineError::Integrity);
    }
    Ok(original.to_vec())
}

impl EncryptAlgorithm for HighStrategy {
    fn algorithm_id(&self) -> &'static str {
        algorithm_id::HIGH
    }

    fn level(&self) -> EncryptionLevel {
        EncryptionLevel::High
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &WorkingKey,
    ) -> EngineResult<(Vec<u8>, AlgorithmFields)> {
        ensure_non_empty(plaintext)?;
        seal_gcm(&wrap(plaintext), key)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &WorkingKey,
        fields: &AlgorithmFields,
    ) -> EngineResult<Vec<u8>> {
        let wrapped = open_gcm(ciphertext, key, fields)?;
        unwrap(&wrapped)
    }
}
