//! Key derivation and ownership.
//!
//! This module owns three responsibilities:
//! 1. Holding the master secret and derived working keys in types that are
//!    opaque, non-cloneable, and zeroised on drop.
//! 2. Deriving per-category, per-version working keys with PBKDF2-HMAC-SHA256.
//! 3. Tracking the current key version and a bounded history of retired
//!    versions, so rotation never strands existing ciphertext.
//!
//! ## Derivation structure
//!
//! ```text
//! PBKDF2-HMAC-SHA256(
//!     secret     = master_secret,
//!     salt       = SHA256("{category}_{version}"),
//!     iterations = 100_000 (configurable upwards),
//!     length     = 32 bytes
//! )
//! ```
//!
//! Each (category, version) pair produces an independent key. Knowing one
//! working key reveals nothing about the master secret or any other key.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::EngineConfig;
use crate::crypto::{self, KEY_LEN};
use crate::error::{EngineError, EngineResult};
use crate::metadata::DataCategory;

// ---------------------------------------------------------------------------
// Master secret
// ---------------------------------------------------------------------------

/// The root secret. All working keys are derived from it.
///
/// - Not `Clone`. Cannot be duplicated without explicit conversion.
/// - Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret {
    bytes: [u8; KEY_LEN],
}

impl MasterSecret {
    /// Construct a `MasterSecret` from raw bytes.
    ///
    /// Production callers normally go through
    /// `store::get_or_create_master_secret`.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

// ---------------------------------------------------------------------------
// Working key
// ---------------------------------------------------------------------------

/// A 256-bit key derived for one category under one key version.
///
/// Never persisted. Equality is constant-time.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WorkingKey {
    bytes: [u8; KEY_LEN],
}

impl WorkingKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl PartialEq for WorkingKey {
    fn eq(&self, other: &Self) -> bool {
        crypto::constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for WorkingKey {}

impl fmt::Debug for WorkingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WorkingKey(..)")
    }
}

// ---------------------------------------------------------------------------
// Key version
// ---------------------------------------------------------------------------

/// Opaque label of a derivation epoch. Immutable once assigned to an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyVersion(String);

impl KeyVersion {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A fresh timestamp-derived label.
    fn from_clock() -> Self {
        Self(format!("v{}", Utc::now().format("%Y%m%d_%H%M%S_%6f")))
    }
}

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the working key for `category` under `version`.
///
/// Pure function of its inputs: the same master secret, category, version
/// and iteration count always yield the same key.
pub(crate) fn derive_working_key(
    master: &MasterSecret,
    category: DataCategory,
    version: &KeyVersion,
    iterations: u32,
) -> EngineResult<WorkingKey> {
    let salt = crypto::sha256(format!("{}_{}", category.as_str(), version.as_str()).as_bytes());
    let bytes = crypto::pbkdf2_sha256(master.as_bytes(), &salt, iterations)?;
    Ok(WorkingKey::from_bytes(bytes))
}

// ---------------------------------------------------------------------------
// Hierarchy manager
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct VersionState {
    current: KeyVersion,
    /// Retired versions, most recent first.
    retained: VecDeque<KeyVersion>,
}

impl VersionState {
    fn is_live(&self, version: &KeyVersion) -> bool {
        &self.current == version || self.retained.contains(version)
    }
}

type CacheKey = (DataCategory, KeyVersion);

/// Owns the master secret and every working key derived from it.
///
/// Shared across threads by reference. The key cache supports concurrent
/// reads and converges racing first derivations on one stored value.
/// Rotation takes the version-state write lock, so no key is derived under
/// a version while that version is being retired.
pub struct KeyHierarchyManager {
    master: MasterSecret,
    iterations: u32,
    max_retained: usize,
    state: RwLock<VersionState>,
    cache: RwLock<HashMap<CacheKey, Arc<WorkingKey>>>,
    rotation: Mutex<()>,
}

impl KeyHierarchyManager {
    pub fn new(master: MasterSecret, config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            master,
            iterations: config.kdf_iterations,
            max_retained: config.retained_versions,
            state: RwLock::new(VersionState {
                current: KeyVersion::new(config.initial_version.clone()),
                retained: config
                    .previous_versions
                    .iter()
                    .cloned()
                    .map(KeyVersion::new)
                    .collect(),
            }),
            cache: RwLock::new(HashMap::new()),
            rotation: Mutex::new(()),
        })
    }

    /// The version new artifacts are encrypted under.
    pub fn current_version(&self) -> KeyVersion {
        self.state.read().current.clone()
    }

    /// Retired versions that are still decryptable, most recent first.
    pub fn retained_versions(&self) -> Vec<KeyVersion> {
        self.state.read().retained.iter().cloned().collect()
    }

    /// The working key for `category` under the current version, together
    /// with that version. Both are read under one lock so they agree.
    pub fn current_key(
        &self,
        category: DataCategory,
    ) -> EngineResult<(KeyVersion, Arc<WorkingKey>)> {
        let state = self.state.read();
        let version = state.current.clone();
        let key = self.cached_or_derive(category, &version)?;
        Ok((version, key))
    }

    /// The working key for `category` under `version`.
    ///
    /// Fails with `UnknownKeyVersion` if the version is neither current nor
    /// retained.
    pub fn derive_working_key(
        &self,
        category: DataCategory,
        version: &KeyVersion,
    ) -> EngineResult<Arc<WorkingKey>> {
        let state = self.state.read();
        if !state.is_live(version) {
            return Err(EngineError::UnknownKeyVersion(version.to_string()));
        }
        self.cached_or_derive(category, version)
    }

    /// Callers must hold the state read lock with `version` live.
    fn cached_or_derive(
        &self,
        category: DataCategory,
        version: &KeyVersion,
    ) -> EngineResult<Arc<WorkingKey>> {
        let cache_key = (category, version.clone());
        if let Some(key) = self.cache.read().get(&cache_key) {
            return Ok(Arc::clone(key));
        }

        // Derive outside the cache lock; PBKDF2 is slow and readers of other
        // keys must not wait on it.
        let derived = Arc::new(derive_working_key(
            &self.master,
            category,
            version,
            self.iterations,
        )?);
        debug!(%category, %version, "derived working key");

        let mut cache = self.cache.write();
        Ok(Arc::clone(cache.entry(cache_key).or_insert(derived)))
    }

    /// True once every category has a cached key for the current version.
    pub fn keys_initialized(&self) -> bool {
        let state = self.state.read();
        let cache = self.cache.read();
        DataCategory::ALL
            .iter()
            .all(|c| cache.contains_key(&(*c, state.current.clone())))
    }

    /// Switch to a new key version.
    ///
    /// All category keys are derived under the new version before the
    /// switch. The previous version joins the retained history; versions
    /// beyond the retention bound are evicted along with their cached keys.
    pub fn rotate(&self) -> EngineResult<KeyVersion> {
        let _rotating = self.rotation.lock();
        let next = {
            let state = self.state.read();
            let mut candidate = KeyVersion::from_clock();
            let mut suffix = 1;
            while state.is_live(&candidate) {
                candidate = KeyVersion(format!("{}-{suffix}", KeyVersion::from_clock()));
                suffix += 1;
            }
            candidate
        };

        let fresh = DataCategory::ALL
            .iter()
            .map(|c| {
                derive_working_key(&self.master, *c, &next, self.iterations)
                    .map(|k| ((*c, next.clone()), Arc::new(k)))
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let mut state = self.state.write();
        let previous = std::mem::replace(&mut state.current, next.clone());
        state.retained.push_front(previous.clone());

        let mut evicted = Vec::new();
        while state.retained.len() > self.max_retained {
            if let Some(v) = state.retained.pop_back() {
                evicted.push(v);
            }
        }

        let mut cache = self.cache.write();
        cache.retain(|(_, v), _| !evicted.contains(v));
        cache.extend(fresh);
        drop(cache);

        info!(
            old_version = %previous,
            new_version = %next,
            evicted = evicted.len(),
            "rotated key version"
        );
        Ok(next)
    }
}

impl fmt::Debug for KeyHierarchyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("KeyHierarchyManager")
            .field("current", &state.current)
            .field("retained", &state.retained)
            .field("cached_keys", &self.cache.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(retained: usize) -> KeyHierarchyManager {
        let config = EngineConfig {
            retained_versions: retained,
            ..EngineConfig::default()
        };
        KeyHierarchyManager::new(MasterSecret::from_bytes([3u8; KEY_LEN]), &config).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let master = MasterSecret::from_bytes([9u8; KEY_LEN]);
        let v = KeyVersion::new("v1.0");
        let a = derive_working_key(&master, DataCategory::PersonalInfo, &v, 100_000).unwrap();
        let b = derive_working_key(&master, DataCategory::PersonalInfo, &v, 100_000).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn categories_and_versions_are_isolated() {
        let master = MasterSecret::from_bytes([9u8; KEY_LEN]);
        let v1 = KeyVersion::new("v1.0");
        let v2 = KeyVersion::new("v2.0");
        let personal =
            derive_working_key(&master, DataCategory::PersonalInfo, &v1, 100_000).unwrap();
        let financial =
            derive_working_key(&master, DataCategory::FinancialData, &v1, 100_000).unwrap();
        let personal_v2 =
            derive_working_key(&master, DataCategory::PersonalInfo, &v2, 100_000).unwrap();
        assert_ne!(personal, financial);
        assert_ne!(personal, personal_v2);
    }

    #[test]
    fn cached_key_is_shared() {
        let m = manager(2);
        let v = m.current_version();
        let a = m.derive_working_key(DataCategory::SessionData, &v).unwrap();
        let b = m.derive_working_key(DataCategory::SessionData, &v).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let m = manager(2);
        assert!(matches!(
            m.derive_working_key(DataCategory::PersonalInfo, &KeyVersion::new("v0")),
            Err(EngineError::UnknownKeyVersion(_))
        ));
    }

    #[test]
    fn seeded_history_is_live_and_bounded() {
        let config = EngineConfig {
            retained_versions: 2,
            ..EngineConfig::default()
        }
        .with_key_versions(
            &KeyVersion::new("v3"),
            &[KeyVersion::new("v2"), KeyVersion::new("v1")],
        );
        let m = KeyHierarchyManager::new(MasterSecret::from_bytes([3u8; KEY_LEN]), &config)
            .unwrap();
        assert_eq!(m.current_version(), KeyVersion::new("v3"));
        assert_eq!(
            m.retained_versions(),
            vec![KeyVersion::new("v2"), KeyVersion::new("v1")]
        );
        assert!(m
            .derive_working_key(DataCategory::PersonalInfo, &KeyVersion::new("v1"))
            .is_ok());

        m.rotate().unwrap();
        assert_eq!(
            m.retained_versions(),
            vec![KeyVersion::new("v3"), KeyVersion::new("v2")]
        );
    }

    #[test]
    fn rotation_retains_bounded_history() {
        let m = manager(1);
        let initial = m.current_version();
        let second = m.rotate().unwrap();
        assert!(m.keys_initialized());
        assert_eq!(m.retained_versions(), vec![initial.clone()]);
        assert!(m.derive_working_key(DataCategory::PersonalInfo, &initial).is_ok());

        let third = m.rotate().unwrap();
        assert_ne!(second, third);
        assert_eq!(m.current_version(), third);
        assert_eq!(m.retained_versions(), vec![second]);
        assert!(matches!(
            m.derive_working_key(DataCategory::PersonalInfo, &initial),
            Err(EngineError::UnknownKeyVersion(_))
        ));
    }
}
