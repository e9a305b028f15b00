//! The encryption engine: the only surface the record service talks to.
//!
//! The engine is stateless per call except for the key hierarchy's cache.
//! It is `Send + Sync`; PBKDF2 derivation and RSA key generation are
//! CPU-bound, so async callers should run engine calls on a blocking pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::keys::{KeyHierarchyManager, KeyVersion};
use crate::metadata::{DataCategory, EncryptedArtifact, EncryptionLevel, EncryptionMetadata};
use crate::policy::{self, EncryptedRecord, Record, RecordOutcome, RecordPolicy};
use crate::store::{self, SecretStore};
use crate::strategy::StrategyRegistry;

/// A snapshot of the engine's state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub available: bool,
    pub current_version: KeyVersion,
    pub retained_versions: Vec<KeyVersion>,
    pub supported_levels: Vec<EncryptionLevel>,
    pub supported_categories: Vec<DataCategory>,
    pub master_secret_persisted: bool,
    pub keys_initialized: bool,
    pub checked_at: DateTime<Utc>,
}

pub struct EncryptionEngine {
    keys: Arc<KeyHierarchyManager>,
    registry: StrategyRegistry,
    store: Option<Arc<dyn SecretStore>>,
}

impl EncryptionEngine {
    /// Load (or create) the master secret from `store` and build an engine.
    ///
    /// A missing-and-unwritable or corrupt secret is fatal.
    pub fn initialize(store: Arc<dyn SecretStore>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let master = store::get_or_create_master_secret(store.as_ref())?;
        let keys = Arc::new(KeyHierarchyManager::new(master, &config)?);
        let engine = Self {
            keys,
            registry: StrategyRegistry::new(&config),
            store: Some(store),
        };
        info!(version = %engine.keys.current_version(), "encryption engine initialized");
        Ok(engine)
    }

    /// Build an engine around an existing key hierarchy.
    pub fn with_key_manager(
        keys: Arc<KeyHierarchyManager>,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            keys,
            registry: StrategyRegistry::new(config),
            store: None,
        })
    }

    pub fn key_manager(&self) -> &KeyHierarchyManager {
        &self.keys
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// A fresh artifact id of the form `{category}_{uuid}`.
    pub fn new_artifact_id(category: DataCategory) -> String {
        format!("{}_{}", category.as_str(), Uuid::new_v4().simple())
    }

    /// Encrypt raw bytes under the current key version.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        category: DataCategory,
        level: EncryptionLevel,
        artifact_id: &str,
    ) -> EngineResult<EncryptedArtifact> {
        let strategy = self.registry.for_level(level)?;
        let (version, key) = self.keys.current_key(category)?;
        let (ciphertext, fields) = strategy.encrypt(plaintext, &key)?;
        debug!(%category, %level, artifact_id, "encrypted artifact");

        Ok(EncryptedArtifact {
            ciphertext,
            metadata: EncryptionMetadata::new(
                artifact_id.to_string(),
                level,
                category,
                version,
                fields,
            ),
        })
    }

    /// Decrypt an artifact using only its metadata and live key material.
    pub fn decrypt(&self, artifact: &EncryptedArtifact) -> EngineResult<Vec<u8>> {
        let meta = &artifact.metadata;
        let strategy = self.registry.select_strategy(&meta.algorithm_id)?;
        if strategy.level() != meta.level {
            return Err(EngineError::UnknownAlgorithm(format!(
                "{} does not implement level {}",
                meta.algorithm_id, meta.level
            )));
        }
        let key = self
            .keys
            .derive_working_key(meta.category, &meta.key_version)?;
        strategy.decrypt(&artifact.ciphertext, &key, &meta.algorithm_fields())
    }

    /// Canonically serialize and encrypt a structured value. Without an
    /// artifact id one is generated.
    pub fn encrypt_value(
        &self,
        value: &Value,
        category: DataCategory,
        level: EncryptionLevel,
        artifact_id: Option<&str>,
    ) -> EngineResult<EncryptedArtifact> {
        let bytes = policy::canonical_bytes(value)?;
        match artifact_id {
            Some(id) => self.encrypt(&bytes, category, level, id),
            None => self.encrypt(&bytes, category, level, &Self::new_artifact_id(category)),
        }
    }

    /// Decrypt an artifact produced by `encrypt_value`, restoring its type.
    pub fn decrypt_value(&self, artifact: &EncryptedArtifact) -> EngineResult<Value> {
        policy::from_canonical_bytes(&self.decrypt(artifact)?)
    }

    pub fn encrypt_record(
        &self,
        record: &Record,
        policy: &RecordPolicy,
    ) -> RecordOutcome<EncryptedRecord> {
        policy.encrypt_record(self, record)
    }

    pub fn decrypt_record(&self, record: &EncryptedRecord) -> RecordOutcome<Record> {
        record.decrypt_record(self)
    }

    /// Switch every category to a new key version. Artifacts under retained
    /// versions stay decryptable.
    pub fn rotate_keys(&self) -> EngineResult<KeyVersion> {
        self.keys.rotate()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            available: true,
            current_version: self.keys.current_version(),
            retained_versions: self.keys.retained_versions(),
            supported_levels: EncryptionLevel::ALL.to_vec(),
            supported_categories: DataCategory::ALL.to_vec(),
            master_secret_persisted: self.store.as_ref().is_some_and(|s| s.exists()),
            keys_initialized: self.keys.keys_initialized(),
            checked_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for EncryptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionEngine")
            .field("keys", &self.keys)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySecretStore;
    use serde_json::json;

    fn engine() -> EncryptionEngine {
        EncryptionEngine::initialize(
            Arc::new(MemorySecretStore::with_secret(&[11u8; 32])),
            EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn initialize_reports_status() {
        let engine = engine();
        let status = engine.status();
        assert!(status.available);
        assert_eq!(status.current_version, KeyVersion::new("v1.0"));
        assert_eq!(status.supported_levels.len(), 4);
        assert_eq!(status.supported_categories.len(), 6);
        assert!(status.master_secret_persisted);
        assert!(!status.keys_initialized);
    }

    #[test]
    fn encrypt_value_generates_category_prefixed_id() {
        let engine = engine();
        let artifact = engine
            .encrypt_value(
                &json!({"a": 1}),
                DataCategory::LegalDocuments,
                EncryptionLevel::Basic,
                None,
            )
            .unwrap();
        assert!(artifact.metadata.artifact_id.starts_with("legal_documents_"));
        assert_eq!(engine.decrypt_value(&artifact).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn level_and_algorithm_must_agree() {
        let engine = engine();
        let mut artifact = engine
            .encrypt(b"x", DataCategory::SessionData, EncryptionLevel::Standard, "s1")
            .unwrap();
        artifact.metadata.level = EncryptionLevel::High;
        assert!(matches!(
            engine.decrypt(&artifact),
            Err(EngineError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn injected_manager_has_no_persisted_secret() {
        let config = EngineConfig::default();
        let keys = Arc::new(
            KeyHierarchyManager::new(crate::keys::MasterSecret::from_bytes([1u8; 32]), &config)
                .unwrap(),
        );
        let engine = EncryptionEngine::with_key_manager(keys, &config).unwrap();
        assert!(!engine.status().master_secret_persisted);
    }
}
