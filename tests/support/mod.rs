//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tiervault::{EncryptionEngine, EngineConfig, MemorySecretStore};

/// An engine over a fixed in-memory master secret.
pub fn engine() -> EncryptionEngine {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> EncryptionEngine {
    EncryptionEngine::initialize(
        Arc::new(MemorySecretStore::with_secret(&[0x5a; 32])),
        config,
    )
    .unwrap()
}

/// Keeps the maximum-level tests fast; the working key is already
/// high-entropy, so the stretch count only matters for cost.
pub fn fast_maximum_config() -> EngineConfig {
    EngineConfig {
        private_key_kdf_iterations: 1_000,
        ..EngineConfig::default()
    }
}
