//! Low-level cryptographic operations.
//!
//! This module is the only place in the crate that drives `ring` primitives
//! for sealing, hashing and derivation. Strategies and the key hierarchy
//! perform cryptography exclusively through the functions exposed here.
//!
//! Primitive choices:
//! - **Cipher**: AES-256-GCM, and ChaCha20-Poly1305 for the basic token
//! - **Nonce**: 96-bit (12 bytes), generated fresh per operation via `SystemRandom`
//! - **Key size**: 256 bits (32 bytes)
//! - **KDF**: PBKDF2-HMAC-SHA256

use std::num::NonZeroU32;

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, CHACHA20_POLY1305};
use ring::digest;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{EngineError, EngineResult};

/// Size of the nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Size of an AEAD authentication tag in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Size of a master secret, working key or content key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Size of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// The AEAD ciphers the strategies build on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl Cipher {
    fn algorithm(self) -> &'static aead::Algorithm {
        match self {
            Self::Aes256Gcm => &AES_256_GCM,
            Self::ChaCha20Poly1305 => &CHACHA20_POLY1305,
        }
    }
}

/// Output of a detached-tag seal.
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl Sealed {
    /// Concatenate as `nonce || tag || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + TAG_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Split a `nonce || tag || ciphertext` buffer.
    ///
    /// Too-short input cannot have come from `to_bytes` and is treated as
    /// tampering.
    pub fn from_bytes(bytes: &[u8]) -> EngineResult<Self> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(EngineError::Authentication);
        }
        let (nonce, rest) = bytes.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        Ok(Self {
            nonce: nonce.try_into().map_err(|_| EngineError::Authentication)?,
            tag: tag.try_into().map_err(|_| EngineError::Authentication)?,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

fn less_safe_key(cipher: Cipher, key_bytes: &[u8; KEY_LEN]) -> EngineResult<LessSafeKey> {
    let unbound = UnboundKey::new(cipher.algorithm(), key_bytes)
        .map_err(|_| EngineError::Encryption("invalid key".into()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under a fresh random nonce, returning the tag
/// separately from the ciphertext.
pub fn seal(
    cipher: Cipher,
    key_bytes: &[u8; KEY_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> EngineResult<Sealed> {
    let nonce = random_array::<NONCE_LEN>()?;
    let key = less_safe_key(cipher, key_bytes)?;
    let mut in_out = plaintext.to_vec();
    let tag = key
        .seal_in_place_separate_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(aad),
            &mut in_out,
        )
        .map_err(|_| EngineError::Encryption("seal failed".into()))?;

    let tag: [u8; TAG_LEN] = tag
        .as_ref()
        .try_into()
        .map_err(|_| EngineError::Encryption("unexpected tag length".into()))?;

    Ok(Sealed {
        nonce,
        tag,
        ciphertext: in_out,
    })
}

/// Verify and decrypt. The tag is checked before any plaintext is released;
/// on failure the caller receives no partial plaintext.
pub fn open(
    cipher: Cipher,
    key_bytes: &[u8; KEY_LEN],
    aad: &[u8],
    sealed: &Sealed,
) -> EngineResult<Vec<u8>> {
    let key = less_safe_key(cipher, key_bytes)?;

    // ring expects the tag appended to the ciphertext.
    let mut in_out = Vec::with_capacity(sealed.ciphertext.len() + TAG_LEN);
    in_out.extend_from_slice(&sealed.ciphertext);
    in_out.extend_from_slice(&sealed.tag);

    let plaintext = key
        .open_in_place(
            Nonce::assume_unique_for_key(sealed.nonce),
            Aad::from(aad),
            &mut in_out,
        )
        .map_err(|_| EngineError::Authentication)?;

    Ok(plaintext.to_vec())
}

/// SHA-256 over `data`.
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(digest::digest(&digest::SHA256, data).as_ref());
    out
}

/// PBKDF2-HMAC-SHA256 producing a 256-bit key.
pub fn pbkdf2_sha256(secret: &[u8], salt: &[u8], iterations: u32) -> EngineResult<[u8; KEY_LEN]> {
    let iterations = NonZeroU32::new(iterations).ok_or(EngineError::KeyDerivation)?;
    let mut out = [0u8; KEY_LEN];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, iterations, salt, secret, &mut out);
    Ok(out)
}

/// Fill a fixed-size array from the system random number generator.
///
/// `SystemRandom` is the crate's only randomness source for key material and
/// nonces. There is no nonce caching or counter-based generation.
pub fn random_array<const N: usize>() -> EngineResult<[u8; N]> {
    let rng = SystemRandom::new();
    let mut buf = [0u8; N];
    rng.fill(&mut buf).map_err(|_| EngineError::Randomness)?;
    Ok(buf)
}

/// Generate a cryptographically secure random 256-bit key.
pub fn generate_random_key() -> EngineResult<[u8; KEY_LEN]> {
    random_array::<KEY_LEN>()
}

/// Compare two byte slices without early exit.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
