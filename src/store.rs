//! Persistence of the master secret.
//!
//! The engine depends on exactly one persisted blob: the master secret. A
//! `SecretStore` abstracts where it lives. `FileSecretStore` keeps it in an
//! access-restricted file; `MemorySecretStore` is for tests and for callers
//! that source the secret from a KMS themselves.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN};
use crate::error::{EngineError, EngineResult};
use crate::keys::MasterSecret;

/// A location holding the master secret.
pub trait SecretStore: Send + Sync {
    /// Read the stored secret, or `None` if nothing has been stored yet.
    fn load(&self) -> EngineResult<Option<Zeroizing<Vec<u8>>>>;

    /// Persist a freshly generated secret with restrictive access.
    fn store(&self, secret: &[u8]) -> EngineResult<()>;

    /// Whether a secret is currently persisted.
    fn exists(&self) -> bool;
}

/// Load the master secret from `store`, generating and persisting one if
/// the store is empty.
///
/// A stored blob of the wrong length is corrupt and fails with `KeyStore`;
/// there is no silent fallback to a fresh secret.
pub fn get_or_create_master_secret(store: &dyn SecretStore) -> EngineResult<MasterSecret> {
    if let Some(bytes) = store.load()? {
        let bytes: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            EngineError::KeyStore(format!(
                "stored master secret is corrupt: expected {KEY_LEN} bytes, found {}",
                bytes.len()
            ))
        })?;
        debug!("loaded existing master secret");
        return Ok(MasterSecret::from_bytes(bytes));
    }

    let bytes = crypto::generate_random_key()?;
    store.store(&bytes)?;
    info!("generated new master secret");
    Ok(MasterSecret::from_bytes(bytes))
}

// ---------------------------------------------------------------------------
// Built-in store: file
// ---------------------------------------------------------------------------

/// Keeps the master secret as raw bytes in a single file.
///
/// On Unix the file is created `0600` and its directory `0700`.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, action: &str, err: std::io::Error) -> EngineError {
        EngineError::KeyStore(format!("cannot {action} {}: {err}", self.path.display()))
    }
}

impl SecretStore for FileSecretStore {
    fn load(&self) -> EngineResult<Option<Zeroizing<Vec<u8>>>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error("open", err)),
        };
        let mut bytes = Zeroizing::new(Vec::with_capacity(KEY_LEN));
        file.read_to_end(&mut bytes)
            .map_err(|e| self.io_error("read", e))?;
        Ok(Some(bytes))
    }

    fn store(&self, secret: &[u8]) -> EngineResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error("create directory for", e))?;
            restrict_dir(dir).map_err(|e| self.io_error("restrict directory of", e))?;
        }

        // The secret only appears at `path` once fully written and synced.
        let staging = self.staging_path();
        match fs::remove_file(&staging) {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                return Err(self.io_error("clear staging file for", err));
            }
            _ => {}
        }
        if let Err(err) = write_private(&staging, secret) {
            let _ = fs::remove_file(&staging);
            return Err(self.io_error("write", err));
        }
        if let Err(err) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(self.io_error("install", err));
        }
        Ok(())
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}

fn write_private(path: &Path, secret: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(secret)?;
    file.sync_all()
}

#[cfg(unix)]
fn restrict_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Built-in store: memory
// ---------------------------------------------------------------------------

/// Holds the master secret in process memory only.
#[derive(Default)]
pub struct MemorySecretStore {
    secret: Mutex<Option<Zeroizing<Vec<u8>>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with `secret`.
    pub fn with_secret(secret: &[u8]) -> Self {
        Self {
            secret: Mutex::new(Some(Zeroizing::new(secret.to_vec()))),
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn load(&self) -> EngineResult<Option<Zeroizing<Vec<u8>>>> {
        Ok(self.secret.lock().clone())
    }

    fn store(&self, secret: &[u8]) -> EngineResult<()> {
        *self.secret.lock() = Some(Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    fn exists(&self) -> bool {
        self.secret.lock().is_some()
    }
}
