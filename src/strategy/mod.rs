//! Encryption level strategies.
//!
//! Each level is implemented by one strategy registered under a stable
//! algorithm id. Encryption picks the strategy by level; decryption picks it
//! by the algorithm id recorded in the artifact's metadata. The registry is
//! populated once and is closed: an unknown id is an error, never a default.

mod basic;
mod high;
mod maximum;
mod standard;

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::keys::WorkingKey;
use crate::metadata::{AlgorithmFields, EncryptionLevel};

pub use basic::BasicStrategy;
pub use high::HighStrategy;
pub use maximum::MaximumStrategy;
pub use standard::StandardStrategy;

/// A reversible encryption scheme keyed by a category working key.
///
/// `decrypt` must reverse `encrypt` given the same key and the fields
/// `encrypt` returned, and must never release plaintext that failed
/// verification.
pub trait EncryptAlgorithm: Send + Sync {
    /// Stable identifier recorded in metadata.
    fn algorithm_id(&self) -> &'static str;

    /// The level this strategy implements.
    fn level(&self) -> EncryptionLevel;

    fn encrypt(&self, plaintext: &[u8], key: &WorkingKey)
        -> EngineResult<(Vec<u8>, AlgorithmFields)>;

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &WorkingKey,
        fields: &AlgorithmFields,
    ) -> EngineResult<Vec<u8>>;
}

/// Rejects zero-byte input; every strategy calls this first.
pub(crate) fn ensure_non_empty(plaintext: &[u8]) -> EngineResult<()> {
    if plaintext.is_empty() {
        return Err(EngineError::EmptyPlaintext);
    }
    Ok(())
}

/// The closed table of registered strategies.
pub struct StrategyRegistry {
    by_id: HashMap<&'static str, Box<dyn EncryptAlgorithm>>,
}

impl StrategyRegistry {
    /// Register the four level strategies.
    pub fn new(config: &EngineConfig) -> Self {
        let strategies: [Box<dyn EncryptAlgorithm>; 4] = [
            Box::new(BasicStrategy),
            Box::new(StandardStrategy),
            Box::new(HighStrategy),
            Box::new(MaximumStrategy::new(config.private_key_kdf_iterations)),
        ];
        let by_id = strategies
            .into_iter()
            .map(|s| (s.algorithm_id(), s))
            .collect();
        Self { by_id }
    }

    /// Look up the strategy registered under `algorithm_id`.
    pub fn select_strategy(&self, algorithm_id: &str) -> EngineResult<&dyn EncryptAlgorithm> {
        self.by_id
            .get(algorithm_id)
            .map(|s| &**s)
            .ok_or_else(|| EngineError::UnknownAlgorithm(algorithm_id.to_string()))
    }

    /// The strategy implementing `level`.
    pub fn for_level(&self, level: EncryptionLevel) -> EngineResult<&dyn EncryptAlgorithm> {
        self.select_strategy(level.algorithm_id())
    }

    /// Registered algorithm ids, sorted.
    pub fn algorithm_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("algorithm_ids", &self.algorithm_ids())
            .finish()
    }
}
