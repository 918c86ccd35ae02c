//! Device storage for the local identity key pair and session token.
//!
//! The key pair is stored as a small JSON record holding both halves in
//! printable form:
//!
//! ```json
//! { "version": 1, "pub": "<base64>", "priv": "<base64>" }
//! ```
//!
//! Records without a `version` field (written by older clients) are
//! accepted as version 1.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroize;

use super::keys::{KeyError, KeyPair};

const STORE_VERSION: u8 = 1;

const KEYPAIR_FILE: &str = "keypair.json";
const SESSION_TOKEN_FILE: &str = "session.token";

/// Errors that can occur while loading or persisting local key material.
#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Stored key pair is corrupt: {0}")]
    Corrupt(KeyError),

    #[error("Unsupported key store version: {0}")]
    UnsupportedVersion(u8),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Crypto initialization failed: {0}")]
    CryptoInit(String),
}

impl KeyStoreError {
    /// True when the failure comes from the crypto primitive rather than
    /// from the storage backend.
    pub fn is_crypto_init(&self) -> bool {
        matches!(self, Self::CryptoInit(_))
    }
}

fn default_version() -> u8 {
    STORE_VERSION
}

/// The persisted form of a key pair.
#[derive(Serialize, Deserialize, Clone)]
pub struct StoredKeypair {
    /// Version of the record format
    #[serde(default = "default_version")]
    pub version: u8,
    /// Base64-encoded public key
    #[serde(rename = "pub")]
    pub public: String,
    /// Base64-encoded private key
    #[serde(rename = "priv")]
    pub secret: String,
}

impl Drop for StoredKeypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl StoredKeypair {
    /// Captures a key pair for persistence.
    pub fn from_keypair(keypair: &KeyPair) -> Self {
        Self {
            version: STORE_VERSION,
            public: keypair.public_key_b64(),
            secret: keypair.secret_key_b64(),
        }
    }

    /// Rebuilds the key pair from the record.
    pub fn to_keypair(&self) -> Result<KeyPair, KeyStoreError> {
        if self.version != STORE_VERSION {
            return Err(KeyStoreError::UnsupportedVersion(self.version));
        }
        KeyPair::from_encoded(&self.public, &self.secret).map_err(KeyStoreError::Corrupt)
    }
}

/// Backend holding the device's persisted key pair and session token.
pub trait KeyStorage: Send + Sync {
    /// Loads the stored key pair record, if any.
    fn load_keypair(&self) -> Result<Option<StoredKeypair>, KeyStoreError>;

    /// Persists the key pair record, replacing any previous one.
    fn save_keypair(&self, record: &StoredKeypair) -> Result<(), KeyStoreError>;

    /// Loads the opaque session token, if any.
    fn load_session_token(&self) -> Result<Option<String>, KeyStoreError>;

    /// Persists the opaque session token.
    fn save_session_token(&self, token: &str) -> Result<(), KeyStoreError>;
}

/// Loads the key pair from storage, or generates and persists a new one.
///
/// This performs no locking; use [`KeyStore`] when several callers may
/// race on first use.
pub fn get_or_create_identity(storage: &dyn KeyStorage) -> Result<KeyPair, KeyStoreError> {
    if let Some(record) = storage.load_keypair()? {
        debug!("loaded existing key pair from device storage");
        return record.to_keypair();
    }

    let keypair = KeyPair::generate().map_err(|e| KeyStoreError::CryptoInit(e.to_string()))?;
    storage.save_keypair(&StoredKeypair::from_keypair(&keypair))?;
    info!(public_key = %keypair.public_key_b64(), "generated new identity key pair");
    Ok(keypair)
}

/// Guards key pair creation so at most one generate-and-persist sequence
/// ever runs, and caches the result for the rest of the session.
pub struct KeyStore<S: KeyStorage> {
    storage: S,
    identity: Mutex<Option<KeyPair>>,
}

impl<S: KeyStorage> KeyStore<S> {
    /// Wraps a storage backend.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            identity: Mutex::new(None),
        }
    }

    /// Returns the device key pair, creating it on first use.
    ///
    /// Idempotent: once a key pair has been loaded or created, the same one
    /// is returned without touching storage again.
    pub fn get_or_create_identity(&self) -> Result<KeyPair, KeyStoreError> {
        let mut slot = self.lock_identity()?;
        if let Some(keypair) = slot.as_ref() {
            return Ok(keypair.clone());
        }

        let keypair = get_or_create_identity(&self.storage)?;
        *slot = Some(keypair.clone());
        Ok(keypair)
    }

    /// Loads the stored session token.
    pub fn session_token(&self) -> Result<Option<String>, KeyStoreError> {
        self.storage.load_session_token()
    }

    /// Persists a session token issued by the auth service.
    pub fn set_session_token(&self, token: &str) -> Result<(), KeyStoreError> {
        self.storage.save_session_token(token)
    }

    /// Access to the underlying backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn lock_identity(&self) -> Result<MutexGuard<'_, Option<KeyPair>>, KeyStoreError> {
        self.identity
            .lock()
            .map_err(|_| KeyStoreError::Unavailable("identity lock poisoned".to_string()))
    }
}

// ============================================================================
// File-backed storage
// ============================================================================

/// Stores key material as files inside a data directory.
#[derive(Debug, Clone)]
pub struct FileKeyStorage {
    dir: PathBuf,
}

impl FileKeyStorage {
    /// Uses `dir` as the device storage directory. It is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn keypair_path(&self) -> PathBuf {
        self.dir.join(KEYPAIR_FILE)
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(SESSION_TOKEN_FILE)
    }

    fn write_private(&self, path: &Path, content: &str) -> Result<(), KeyStoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, content)?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }
}

impl KeyStorage for FileKeyStorage {
    fn load_keypair(&self) -> Result<Option<StoredKeypair>, KeyStoreError> {
        let path = self.keypair_path();
        if !path.exists() {
            return Ok(None);
        }

        let mut content = fs::read_to_string(&path)?;
        let record = serde_json::from_str(&content);
        content.zeroize();
        Ok(Some(record?))
    }

    fn save_keypair(&self, record: &StoredKeypair) -> Result<(), KeyStoreError> {
        let mut content = serde_json::to_string_pretty(record)?;
        let result = self.write_private(&self.keypair_path(), &content);
        content.zeroize();
        result
    }

    fn load_session_token(&self) -> Result<Option<String>, KeyStoreError> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }

        let token = fs::read_to_string(&path)?.trim().to_string();
        Ok((!token.is_empty()).then_some(token))
    }

    fn save_session_token(&self, token: &str) -> Result<(), KeyStoreError> {
        self.write_private(&self.token_path(), token)
    }
}

// ============================================================================
// In-memory storage
// ============================================================================

/// Volatile storage, for tests and for sessions that must not touch disk.
#[derive(Default)]
pub struct MemoryKeyStorage {
    keypair: Mutex<Option<StoredKeypair>>,
    token: Mutex<Option<String>>,
    saves: Mutex<usize>,
}

impl MemoryKeyStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times a key pair has been written.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> KeyStoreError {
    KeyStoreError::Unavailable("storage lock poisoned".to_string())
}

impl KeyStorage for MemoryKeyStorage {
    fn load_keypair(&self) -> Result<Option<StoredKeypair>, KeyStoreError> {
        Ok(self.keypair.lock().map_err(poisoned)?.clone())
    }

    fn save_keypair(&self, record: &StoredKeypair) -> Result<(), KeyStoreError> {
        *self.keypair.lock().map_err(poisoned)? = Some(record.clone());
        *self.saves.lock().map_err(poisoned)? += 1;
        Ok(())
    }

    fn load_session_token(&self) -> Result<Option<String>, KeyStoreError> {
        Ok(self.token.lock().map_err(poisoned)?.clone())
    }

    fn save_session_token(&self, token: &str) -> Result<(), KeyStoreError> {
        *self.token.lock().map_err(poisoned)? = Some(token.to_string());
        Ok(())
    }
}
