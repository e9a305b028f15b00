//! Maximum level: hybrid encryption with a per-artifact ephemeral RSA key.
//!
//! For every artifact a fresh 256-bit content key and a fresh RSA key pair
//! are generated. The payload is sealed with AES-256-GCM under the content
//! key, the content key is wrapped with RSA-OAEP(SHA-256) under the
//! ephemeral public key, and the ephemeral private key (PKCS#8 DER) is
//! sealed under a key stretched from the category working key with a random
//! salt. The salt travels in `metadata.extra`, the payload nonce in
//! `metadata.nonce`.
//!
//! ```text
//! [ len, u16 BE ][ RSA-OAEP wrapped content key ]
//! [ len, u32 BE ][ protected private key: nonce || tag || ct ]
//! [ payload nonce (12) ][ payload tag (16) ][ payload ct ]
//! ```
//!
//! Decryption reverses this: unseal the private key with the working key,
//! unwrap the content key, open the payload. Any structural damage is
//! reported as `Authentication`, the same as a failed tag.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::{self, Cipher, Sealed, KEY_LEN};
use crate::error::{EngineError, EngineResult};
use crate::keys::WorkingKey;
use crate::metadata::{algorithm_id, AlgorithmFields, EncryptionLevel};
use crate::strategy::{ensure_non_empty, EncryptAlgorithm};

const SALT_LEN: usize = 16;

/// Modulus of the ephemeral key pair. Fixed by the algorithm id.
const RSA_BITS: usize = 2048;

/// Associated data binding the protected private key to its purpose.
const PRIVATE_KEY_AAD: &[u8] = b"tiervault/maximum/private-key";

#[derive(Debug, Clone, Copy)]
pub struct MaximumStrategy {
    kdf_iterations: u32,
}

impl MaximumStrategy {
    pub fn new(kdf_iterations: u32) -> Self {
        Self { kdf_iterations }
    }

    fn protection_key(
        &self,
        key: &WorkingKey,
        salt: &[u8],
    ) -> EngineResult<Zeroizing<[u8; KEY_LEN]>> {
        Ok(Zeroizing::new(crypto::pbkdf2_sha256(
            key.as_bytes(),
            salt,
            self.kdf_iterations,
        )?))
    }
}

/// A cursor over the blob; running out of bytes means tampering.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> EngineResult<&'a [u8]> {
        if self.buf.len() < n {
            return Err(EngineError::Authentication);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn take_u16_prefixed(&mut self) -> EngineResult<&'a [u8]> {
        let len = u16::from_be_bytes(
            self.take(2)?
                .try_into()
                .map_err(|_| EngineError::Authentication)?,
        );
        self.take(len as usize)
    }

    fn take_u32_prefixed(&mut self) -> EngineResult<&'a [u8]> {
        let len = u32::from_be_bytes(
            self.take(4)?
                .try_into()
                .map_err(|_| EngineError::Authentication)?,
        );
        self.take(len as usize)
    }
}

impl EncryptAlgorithm for MaximumStrategy {
    fn algorithm_id(&self) -> &'static str {
        algorithm_id::MAXIMUM
    }

    fn level(&self) -> EncryptionLevel {
        EncryptionLevel::Maximum
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &WorkingKey,
    ) -> EngineResult<(Vec<u8>, AlgorithmFields)> {
        ensure_non_empty(plaintext)?;

        let content_key = Zeroizing::new(crypto::generate_random_key()?);
        let payload = crypto::seal(Cipher::Aes256Gcm, &content_key, &[], plaintext)?;

        let private = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|e| EngineError::Encryption(format!("rsa key generation: {e}")))?;
        let public = RsaPublicKey::from(&private);
        let wrapped_key = public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &content_key[..])
            .map_err(|e| EngineError::Encryption(format!("rsa-oaep wrap: {e}")))?;

        let der = private
            .to_pkcs8_der()
            .map_err(|e| EngineError::Encryption(format!("private key encoding: {e}")))?;
        let salt = crypto::random_array::<SALT_LEN>()?;
        let protection_key = self.protection_key(key, &salt)?;
        let protected =
            crypto::seal(Cipher::Aes256Gcm, &protection_key, PRIVATE_KEY_AAD, der.as_bytes())?
                .to_bytes();

        let wrapped_len = u16::try_from(wrapped_key.len())
            .map_err(|_| EngineError::Encryption("wrapped key too large".into()))?;
        let protected_len = u32::try_from(protected.len())
            .map_err(|_| EngineError::Encryption("protected key too large".into()))?;

        let payload_bytes = payload.to_bytes();
        let mut blob =
            Vec::with_capacity(2 + wrapped_key.len() + 4 + protected.len() + payload_bytes.len());
        blob.extend_from_slice(&wrapped_len.to_be_bytes());
        blob.extend_from_slice(&wrapped_key);
        blob.extend_from_slice(&protected_len.to_be_bytes());
        blob.extend_from_slice(&protected);
        blob.extend_from_slice(&payload_bytes);

        let fields = AlgorithmFields {
            nonce: Some(payload.nonce.to_vec()),
            extra: Some(salt.to_vec()),
        };
        Ok((blob, fields))
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &WorkingKey,
        fields: &AlgorithmFields,
    ) -> EngineResult<Vec<u8>> {
        let mut reader = Reader { buf: ciphertext };
        let wrapped_key = reader.take_u16_prefixed()?;
        let protected = Sealed::from_bytes(reader.take_u32_prefixed()?)?;
        let payload = Sealed::from_bytes(reader.buf)?;

        if let Some(nonce) = &fields.nonce {
            if !crypto::constant_time_eq(nonce, &payload.nonce) {
                return Err(EngineError::Authentication);
            }
        }
        let salt = fields.extra.as_deref().ok_or(EngineError::Authentication)?;

        let protection_key = self.protection_key(key, salt)?;
        let der = Zeroizing::new(crypto::open(
            Cipher::Aes256Gcm,
            &protection_key,
            PRIVATE_KEY_AAD,
            &protected,
        )?);
        let private =
            RsaPrivateKey::from_pkcs8_der(&der).map_err(|_| EngineError::Authentication)?;

        let content_key = Zeroizing::new(
            private
                .decrypt(Oaep::new::<Sha256>(), wrapped_key)
                .map_err(|_| EngineError::Authentication)?,
        );
        let content_key: Zeroizing<[u8; KEY_LEN]> = Zeroizing::new(
            content_key
                .as_slice()
                .try_into()
                .map_err(|_| EngineError::Authentication)?,
        );

        crypto::open(Cipher::Aes256Gcm, &content_key, &[], &payload)
    }
}
