//! Master-secret bootstrap through the file store.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tiervault::{
    DataCategory, EncryptionEngine, EncryptionLevel, EngineConfig, EngineError, FileSecretStore,
};

fn open(path: &Path, config: EngineConfig) -> Result<EncryptionEngine, EngineError> {
    EncryptionEngine::initialize(Arc::new(FileSecretStore::new(path)), config)
}

#[test]
fn secret_persists_across_engine_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config").join("master.key");

    let artifact = {
        let engine = open(&path, EngineConfig::default()).unwrap();
        assert!(engine.status().master_secret_persisted);
        engine
            .encrypt(
                b"survives restart",
                DataCategory::PersonalInfo,
                EncryptionLevel::Standard,
                "p1",
            )
            .unwrap()
    };

    let restarted = open(&path, EngineConfig::default()).unwrap();
    assert_eq!(restarted.decrypt(&artifact).unwrap(), b"survives restart");
}

#[test]
fn rotated_versions_survive_restart_when_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("master.key");

    let (before, after, saved) = {
        let engine = open(&path, EngineConfig::default()).unwrap();
        let before = engine
            .encrypt(b"pre-rotation", DataCategory::FinancialData, EncryptionLevel::High, "a")
            .unwrap();
        engine.rotate_keys().unwrap();
        let after = engine
            .encrypt(b"post-rotation", DataCategory::FinancialData, EncryptionLevel::Standard, "b")
            .unwrap();
        (before, after, engine.status())
    };

    // Without the saved version state only the initial version is known.
    let cold = open(&path, EngineConfig::default()).unwrap();
    assert!(matches!(
        cold.decrypt(&after),
        Err(EngineError::UnknownKeyVersion(_))
    ));

    let config = EngineConfig::default()
        .with_key_versions(&saved.current_version, &saved.retained_versions);
    let resumed = open(&path, config).unwrap();
    assert_eq!(resumed.status().current_version, saved.current_version);
    assert_eq!(resumed.decrypt(&after).unwrap(), b"post-rotation");
    assert_eq!(resumed.decrypt(&before).unwrap(), b"pre-rotation");

    let fresh = resumed
        .encrypt(b"new", DataCategory::FinancialData, EncryptionLevel::Basic, "c")
        .unwrap();
    assert_eq!(fresh.metadata.key_version, saved.current_version);
}

#[test]
fn corrupt_secret_is_fatal_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("master.key");
    fs::write(&path, b"not-a-32-byte-secret").unwrap();

    let result = open(&path, EngineConfig::default());
    assert!(matches!(result, Err(EngineError::KeyStore(_))));
    // The corrupt file is left for inspection, never overwritten.
    assert_eq!(fs::read(&path).unwrap(), b"not-a-32-byte-secret");
}

#[test]
fn unwritable_location_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"a file, not a directory").unwrap();

    let result = EncryptionEngine::initialize(
        Arc::new(FileSecretStore::new(blocker.join("master.key"))),
        EngineConfig::default(),
    );
    assert!(matches!(result, Err(EngineError::KeyStore(_))));
}

#[test]
fn invalid_config_is_rejected_before_touching_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("master.key");
    let config = EngineConfig {
        kdf_iterations: 10,
        ..EngineConfig::default()
    };

    let result = EncryptionEngine::initialize(Arc::new(FileSecretStore::new(&path)), config);
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    assert!(!path.exists());
}
