//! Basic level: a self-describing authenticated token.
//!
//! ```text
//! [ version (1) ][ issued_at, u64 BE unix seconds (8) ][ nonce (12) ][ ciphertext ][ tag (16) ]
//! ```
//!
//! The version byte and timestamp are bound as associated data, so the token
//! alone carries everything needed to decrypt it; metadata records no nonce.

use chrono::Utc;

use crate::crypto::{self, Cipher, Sealed, NONCE_LEN, TAG_LEN};
use crate::error::{EngineError, EngineResult};
use crate::keys::WorkingKey;
use crate::metadata::{algorithm_id, AlgorithmFields, EncryptionLevel};
use crate::strategy::{ensure_non_empty, EncryptAlgorithm};

const TOKEN_VERSION: u8 = 0x80;
const HEADER_LEN: usize = 1 + 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct BasicStrategy;

impl BasicStrategy {
    /// Unix timestamp at which `token` was issued, if it is well formed.
    /// The value is unauthenticated until the token is decrypted.
    pub fn issued_at(token: &[u8]) -> Option<u64> {
        if token.len() < HEADER_LEN || token[0] != TOKEN_VERSION {
            return None;
        }
        let bytes: [u8; 8] = token[1..HEADER_LEN].try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }
}

impl EncryptAlgorithm for BasicStrategy {
    fn algorithm_id(&self) -> &'static str {
        algorithm_id::BASIC
    }

    fn level(&self) -> EncryptionLevel {
        EncryptionLevel::Basic
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &WorkingKey,
    ) -> EngineResult<(Vec<u8>, AlgorithmFields)> {
        ensure_non_empty(plaintext)?;

        let issued_at = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        let mut header = [0u8; HEADER_LEN];
        header[0] = TOKEN_VERSION;
        header[1..].copy_from_slice(&issued_at.to_be_bytes());

        let sealed = crypto::seal(Cipher::ChaCha20Poly1305, key.as_bytes(), &header, plaintext)?;

        let mut token =
            Vec::with_capacity(HEADER_LEN + NONCE_LEN + sealed.ciphertext.len() + TAG_LEN);
        token.extend_from_slice(&header);
        token.extend_from_slice(&sealed.nonce);
        token.extend_from_slice(&sealed.ciphertext);
        token.extend_from_slice(&sealed.tag);

        Ok((token, AlgorithmFields::default()))
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &WorkingKey,
        _fields: &AlgorithmFields,
    ) -> EngineResult<Vec<u8>> {
        if ciphertext.len() < HEADER_LEN + NONCE_LEN + TAG_LEN || ciphertext[0] != TOKEN_VERSION {
            return Err(EngineError::Authentication);
        }

        let (header, rest) = ciphertext.split_at(HEADER_LEN);
        let (nonce, body) = rest.split_at(NONCE_LEN);
        let (ct, tag) = body.split_at(body.len() - TAG_LEN);

        let sealed = Sealed {
            nonce: nonce.try_into().map_err(|_| EngineError::Authentication)?,
            tag: tag.try_into().map_err(|_| EngineError::Authentication)?,
            ciphertext: ct.to_vec(),
        };
        crypto::open(Cipher::ChaCha20Poly1305, key.as_bytes(), header, &sealed)
    }
}
