//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::keys::KeyVersion;

/// Lowest PBKDF2 iteration count accepted for working-key derivation.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Configuration for the encryption engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// PBKDF2 rounds for working-key derivation.
    pub kdf_iterations: u32,

    /// Number of previous key versions kept decryptable after rotation.
    pub retained_versions: usize,

    /// Label of the key version new artifacts are encrypted under at
    /// startup.
    pub initial_version: String,

    /// Retired versions that must stay decryptable at startup, most recent
    /// first. Persist `EngineStatus::retained_versions` after a rotation and
    /// feed it back here, or artifacts under those versions are lost on
    /// restart.
    pub previous_versions: Vec<String>,

    /// PBKDF2 rounds stretching the working key into the key that protects
    /// the ephemeral RSA private key.
    pub private_key_kdf_iterations: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: MIN_KDF_ITERATIONS,
            retained_versions: 4,
            initial_version: "v1.0".to_string(),
            previous_versions: Vec::new(),
            private_key_kdf_iterations: 10_000,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json_str(s: &str) -> EngineResult<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resume from a version state saved after a rotation: `current` becomes
    /// the starting version and `retained` the decryptable history.
    pub fn with_key_versions(mut self, current: &KeyVersion, retained: &[KeyVersion]) -> Self {
        self.initial_version = current.to_string();
        self.previous_versions = retained.iter().map(KeyVersion::to_string).collect();
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.kdf_iterations < MIN_KDF_ITERATIONS {
            return Err(EngineError::InvalidConfig(format!(
                "kdf_iterations must be at least {MIN_KDF_ITERATIONS}"
            )));
        }
        if self.retained_versions == 0 {
            return Err(EngineError::InvalidConfig(
                "retained_versions must be at least 1".into(),
            ));
        }
        if self.initial_version.trim().is_empty() {
            return Err(EngineError::InvalidConfig("initial_version is empty".into()));
        }
        if self.previous_versions.len() > self.retained_versions {
            return Err(EngineError::InvalidConfig(format!(
                "{} previous versions exceed retained_versions ({})",
                self.previous_versions.len(),
                self.retained_versions
            )));
        }
        for (i, version) in self.previous_versions.iter().enumerate() {
            if version.trim().is_empty() {
                return Err(EngineError::InvalidConfig("previous version is empty".into()));
            }
            if *version == self.initial_version || self.previous_versions[..i].contains(version) {
                return Err(EngineError::InvalidConfig(format!(
                    "duplicate key version {version}"
                )));
            }
        }
        if self.private_key_kdf_iterations == 0 {
            return Err(EngineError::InvalidConfig(
                "private_key_kdf_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
