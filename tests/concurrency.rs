//! The engine is shared across threads; the key cache converges and
//! rotation never strands in-flight work.

mod support;

use std::sync::Arc;
use std::thread;

use tiervault::{DataCategory, EncryptionLevel};

#[test]
fn racing_derivations_converge() {
    let engine = support::engine();
    let current = engine.status().current_version;
    let version = &current;
    let keys = engine.key_manager();

    let derived: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(move || {
                    keys.derive_working_key(DataCategory::PersonalInfo, version)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &derived[0];
    assert!(derived.iter().all(|k| k == first));
    let cached = keys.derive_working_key(DataCategory::PersonalInfo, version).unwrap();
    assert!(derived.iter().any(|k| Arc::ptr_eq(k, &cached)));
}

#[test]
fn category_keys_are_isolated_and_deterministic() {
    let engine = support::engine();
    let version = engine.status().current_version;
    let keys = engine.key_manager();

    let all: Vec<_> = DataCategory::ALL
        .iter()
        .map(|c| keys.derive_working_key(*c, &version).unwrap())
        .collect();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            assert_ne!(a, b);
        }
    }

    // A second manager over the same secret derives identical keys.
    let other = support::engine();
    for (c, key) in DataCategory::ALL.iter().zip(&all) {
        assert_eq!(&other.key_manager().derive_working_key(*c, &version).unwrap(), key);
    }
}

#[test]
fn encrypt_and_decrypt_while_rotating() {
    let engine = support::engine();

    thread::scope(|s| {
        for worker in 0..4 {
            let engine = &engine;
            s.spawn(move || {
                for i in 0..5 {
                    let payload = format!("worker {worker} item {i}");
                    let artifact = engine
                        .encrypt(
                            payload.as_bytes(),
                            DataCategory::SessionData,
                            EncryptionLevel::Standard,
                            &format!("w{worker}-{i}"),
                        )
                        .unwrap();
                    assert_eq!(engine.decrypt(&artifact).unwrap(), payload.as_bytes());
                }
            });
        }
        s.spawn(|| {
            engine.rotate_keys().unwrap();
            engine.rotate_keys().unwrap();
        });
    });

    assert_eq!(engine.status().retained_versions.len(), 2);
}
