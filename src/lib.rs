//! # tiervault
//!
//! Tiered field-level encryption engine.
//!
//! A single master secret is stretched into one working key per data
//! category and key version. Payloads are encrypted at one of four levels
//! (basic, standard, high, maximum), each implemented by a strategy
//! registered under a stable algorithm id. Every ciphertext travels with
//! non-secret metadata that, together with live key material, is all that
//! is needed to decrypt it.
//!
//! ## Public API
//!
//! Callers normally construct an [`EncryptionEngine`] with
//! [`EncryptionEngine::initialize`] and use its methods. Lower-level types
//! are exported for dependency injection and inspection.

pub mod config;
pub(crate) mod crypto;
pub(crate) mod encoding;
pub mod engine;
pub mod error;
pub mod keys;
pub mod metadata;
pub mod policy;
pub mod store;
pub mod strategy;

pub use config::EngineConfig;
pub use engine::{EncryptionEngine, EngineStatus};
pub use error::{EngineError, EngineResult};
pub use keys::{KeyHierarchyManager, KeyVersion, MasterSecret, WorkingKey};
pub use metadata::{
    algorithm_id, AlgorithmFields, DataCategory, EncryptedArtifact, EncryptionLevel,
    EncryptionMetadata,
};
pub use policy::{EncryptedRecord, FieldRule, Record, RecordOutcome, RecordPolicy};
pub use store::{get_or_create_master_secret, FileSecretStore, MemorySecretStore, SecretStore};
pub use strategy::{EncryptAlgorithm, StrategyRegistry};

/// Generate a cryptographically secure master secret.
///
/// In production the secret is usually loaded through a [`SecretStore`];
/// this is for callers that manage persistence themselves.
pub fn generate_master_secret() -> EngineResult<MasterSecret> {
    let bytes = crypto::generate_random_key()?;
    Ok(MasterSecret::from_bytes(bytes))
}
