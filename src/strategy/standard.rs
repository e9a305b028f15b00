//! Standard level: AES-256-GCM under the category working key.
//!
//! ```text
//! [ nonce (12) ][ tag (16) ][ ciphertext ]
//! ```

use crate::crypto::{self, Cipher, Sealed};
use crate::error::{EngineError, EngineResult};
use crate::keys::WorkingKey;
use crate::metadata::{algorithm_id, AlgorithmFields, EncryptionLevel};
use crate::strategy::{ensure_non_empty, EncryptAlgorithm};

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardStrategy;

/// Seal with a fresh nonce and record the nonce in the metadata fields.
pub(crate) fn seal_gcm(
    plaintext: &[u8],
    key: &WorkingKey,
) -> EngineResult<(Vec<u8>, AlgorithmFields)> {
    let sealed = crypto::seal(Cipher::Aes256Gcm, key.as_bytes(), &[], plaintext)?;
    let fields = AlgorithmFields {
        nonce: Some(sealed.nonce.to_vec()),
        extra: None,
    };
    Ok((sealed.to_bytes(), fields))
}

/// Verify and decrypt a `seal_gcm` output. A metadata nonce that disagrees
/// with the embedded one is treated as tampering.
pub(crate) fn open_gcm(
    ciphertext: &[u8],
    key: &WorkingKey,
    fields: &AlgorithmFields,
) -> EngineResult<Vec<u8>> {
    let sealed = Sealed::from_bytes(ciphertext)?;
    if let Some(nonce) = &fields.nonce {
        if !crypto::constant_time_eq(nonce, &sealed.nonce) {
            return Err(EngineError::Authentication);
        }
    }
    crypto::open(Cipher::Aes256Gcm, key.as_bytes(), &[], &sealed)
}

impl EncryptAlgorithm for StandardStrategy {
    fn algorithm_id(&self) -> &'static str {
        algorithm_id::STANDARD
    }

    fn level(&self) -> EncryptionLevel {
        EncryptionLevel::Standard
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &WorkingKey,
    ) -> EngineResult<(Vec<u8>, AlgorithmFields)> {
        ensure_non_empty(plaintext)?;
        seal_gcm(plaintext, key)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &WorkingKey,
        fields: &AlgorithmFields,
    ) -> EngineResult<Vec<u8>> {
        open_gcm(ciphertext, key, fields)
    }
}
