//! Error types for tiervault.
//!
//! Every variant is a distinct failure mode of the engine. Messages are
//! intentionally minimal: they signal *what* failed without revealing key
//! material, plaintext or anything else that could leak cryptographic state.

use thiserror::Error;

/// The single error type for all tiervault operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The master secret could not be read, written, or was corrupt.
    #[error("key store error: {0}")]
    KeyStore(String),

    /// A data category label did not name a known category.
    #[error("invalid data category: {0}")]
    InvalidCategory(String),

    /// An encryption level label did not name a known level.
    #[error("invalid encryption level: {0}")]
    InvalidLevel(String),

    /// Metadata named an algorithm id that has no registered strategy.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Metadata named a key version that is neither current nor retained.
    #[error("unknown or retired key version: {0}")]
    UnknownKeyVersion(String),

    /// AEAD verification failed: tampered ciphertext or wrong key.
    #[error("authentication failed")]
    Authentication,

    /// The embedded integrity hash did not match the recovered plaintext.
    #[error("integrity check failed")]
    Integrity,

    /// A field value could not be canonically encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Strategies refuse to encrypt zero bytes.
    #[error("plaintext is empty")]
    EmptyPlaintext,

    /// An underlying encryption primitive failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Working-key derivation failed.
    #[error("key derivation failed")]
    KeyDerivation,

    /// The system random number generator failed to produce bytes.
    #[error("randomness source failed")]
    Randomness,

    /// The engine configuration violates a constraint.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A single record field failed to decrypt.
    #[error("decryption of field `{field}` failed: {source}")]
    Decryption {
        field: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Wrap an error as the record-level failure of `field`.
    pub fn for_field(field: impl Into<String>, source: EngineError) -> Self {
        Self::Decryption {
            field: field.into(),
            source: Box::new(source),
        }
    }

    /// True when the failure indicates tampering or a wrong key, including
    /// when wrapped as a field failure.
    pub fn is_tamper(&self) -> bool {
        match self {
            Self::Authentication | Self::Integrity => true,
            Self::Decryption { source, .. } => source.is_tamper(),
            _ => false,
        }
    }

    /// The innermost cause, unwrapping record-level field failures.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            Self::Decryption { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_failure_keeps_cause() {
        let err = EngineError::for_field("ssn", EngineError::Integrity);
        assert!(err.is_tamper());
        assert!(matches!(err.root_cause(), EngineError::Integrity));
        assert_eq!(
            err.to_string(),
            "decryption of field `ssn` failed: integrity check failed"
        );
    }

    #[test]
    fn non_tamper_errors() {
        assert!(!EngineError::EmptyPlaintext.is_tamper());
        assert!(!EngineError::UnknownAlgorithm("x".into()).is_tamper());
    }
}
