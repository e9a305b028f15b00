//! Minimal example: protecting a client questionnaire.
//!
//! Bootstraps a master secret on disk, encrypts a record field by field,
//! rotates keys and shows that older records still decrypt.
//! Run with: `cargo run --example questionnaire_demo`

use std::sync::Arc;

use serde_json::json;
use tiervault::{
    DataCategory, EncryptionEngine, EncryptionLevel, EngineConfig, FileSecretStore, Record,
    RecordPolicy,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Setup: the secret is generated on first run and reused afterwards.
    let key_path = std::env::temp_dir().join("tiervault_demo").join("master.key");
    let engine = EncryptionEngine::initialize(
        Arc::new(FileSecretStore::new(&key_path)),
        EngineConfig::default(),
    )?;
    println!("Master secret at: {}", key_path.display());

    // 2. A questionnaire record.
    let record: Record = serde_json::from_value(json!({
        "clientId": "client-001",
        "bioData": { "fullName": "Alice Example", "ssn": "123-45-6789" },
        "financialData": { "income": 120000, "assets": ["house"] },
        "objectives": "Early retirement",
    }))?;

    // 3. Encrypt per the questionnaire policy.
    let encrypted = engine
        .encrypt_record(&record, &RecordPolicy::questionnaire_default())
        .into_complete()?;
    println!("Encrypted fields: {:?}", encrypted.encrypted_field_names());
    for (field, artifact) in &encrypted.encrypted_fields {
        println!(
            "  {field}: {} under {} ({} bytes)",
            artifact.metadata.algorithm_id,
            artifact.metadata.key_version,
            artifact.ciphertext.len()
        );
    }

    // 4. A single value at the maximum level.
    let contract = engine.encrypt(
        b"signed engagement letter",
        DataCategory::LegalDocuments,
        EncryptionLevel::Maximum,
        &EncryptionEngine::new_artifact_id(DataCategory::LegalDocuments),
    )?;

    // 5. Rotate; both artifacts still decrypt under the retired version.
    let version = engine.rotate_keys()?;
    println!("Rotated to {version}");
    let restored = engine.decrypt_record(&encrypted).into_complete()?;
    assert_eq!(restored, record);
    assert_eq!(engine.decrypt(&contract)?, b"signed engagement letter");

    // 6. Status.
    println!("{}", serde_json::to_string_pretty(&engine.status())?);

    Ok(())
}
