mod support;

use std::sync::OnceLock;

use proptest::prelude::*;
use serde_json::json;
use tiervault::{
    algorithm_id, DataCategory, EncryptionEngine, EncryptionLevel, EngineError,
};

fn shared() -> &'static EncryptionEngine {
    static ENGINE: OnceLock<EncryptionEngine> = OnceLock::new();
    ENGINE.get_or_init(support::engine)
}

#[test]
fn every_level_and_category_roundtrips() {
    let engine = support::engine_with(support::fast_maximum_config());
    let plaintext = b"Clause 4.2: the estate passes to the surviving spouse.";

    for category in DataCategory::ALL {
        for level in EncryptionLevel::ALL {
            let id = format!("{category}-{level}");
            let artifact = engine.encrypt(plaintext, category, level, &id).unwrap();
            assert_eq!(artifact.metadata.level, level);
            assert_eq!(artifact.metadata.category, category);
            assert_eq!(artifact.metadata.algorithm_id, level.algorithm_id());
            assert_eq!(artifact.metadata.artifact_id, id);
            assert_eq!(
                engine.decrypt(&artifact).unwrap(),
                plaintext,
                "{category} at {level}"
            );
        }
    }
}

#[test]
fn ssn_under_standard_level() {
    let engine = shared();
    let artifact = engine
        .encrypt_value(
            &json!("123-45-6789"),
            DataCategory::PersonalInfo,
            EncryptionLevel::Standard,
            Some("f1"),
        )
        .unwrap();

    assert_eq!(artifact.metadata.algorithm_id, algorithm_id::STANDARD);
    assert_eq!(artifact.metadata.artifact_id, "f1");
    assert!(artifact.ciphertext.len() >= "123-45-6789".len() + 28);
    assert_eq!(artifact.metadata.nonce.as_deref(), Some(&artifact.ciphertext[..12]));
    assert_eq!(engine.decrypt_value(&artifact).unwrap(), json!("123-45-6789"));
}

#[test]
fn empty_structured_values_roundtrip() {
    let engine = shared();
    for value in [json!({}), json!([]), json!("")] {
        let artifact = engine
            .encrypt_value(&value, DataCategory::SessionData, EncryptionLevel::High, None)
            .unwrap();
        assert_eq!(engine.decrypt_value(&artifact).unwrap(), value);
    }
}

#[test]
fn empty_plaintext_is_a_caller_error() {
    let engine = shared();
    for level in EncryptionLevel::ALL {
        assert!(matches!(
            engine.encrypt(b"", DataCategory::PersonalInfo, level, "empty"),
            Err(EngineError::EmptyPlaintext)
        ));
    }
}

#[test]
fn artifact_survives_json_transport() {
    let engine = shared();
    let artifact = engine
        .encrypt(b"wire", DataCategory::Authentication, EncryptionLevel::High, "t1")
        .unwrap();
    let json = artifact.to_json().unwrap();
    let parsed = tiervault::EncryptedArtifact::from_json(&json).unwrap();
    assert_eq!(parsed, artifact);
    assert_eq!(engine.decrypt(&parsed).unwrap(), b"wire");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_bytes_roundtrip(
        payload in proptest::collection::vec(any::<u8>(), 1..512),
        level in prop_oneof![
            Just(EncryptionLevel::Basic),
            Just(EncryptionLevel::Standard),
            Just(EncryptionLevel::High),
        ],
    ) {
        let engine = shared();
        let artifact = engine
            .encrypt(&payload, DataCategory::FinancialData, level, "prop")
            .unwrap();
        prop_assert_eq!(engine.decrypt(&artifact).unwrap(), payload);
    }
}
