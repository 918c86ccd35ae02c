//! Cached peer public keys.
//!
//! Directory entries are cached in `<data_dir>/peers.toml`:
//!
//! ```toml
//! [peers]
//! bob = "base64-public-key"
//! ```
//!
//! The cache is refreshed from the directory on every join; the directory
//! stays authoritative.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use x25519_dalek::PublicKey;

use crate::crypto::{decode_public_key, encode_public_key};

/// Name of the peer cache file inside the data directory.
pub const PEERS_FILE_NAME: &str = "peers.toml";

/// Errors that can occur when reading or writing the peer cache.
#[derive(Error, Debug)]
pub enum PeerCacheError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// Username to public key cache.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct PeerCache {
    /// Map of normalised usernames to base64 public keys.
    #[serde(default)]
    peers: BTreeMap<String, String>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl PeerCache {
    /// An empty cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache from `path`, or start empty if the file doesn't exist.
    ///
    /// Later calls to [`save`](Self::save) write back to `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PeerCacheError> {
        let path = path.into();

        let mut cache = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str::<PeerCache>(&content)?
        } else {
            Self::default()
        };
        cache.path = Some(path);
        Ok(cache)
    }

    /// Load `peers.toml` from a data directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self, PeerCacheError> {
        Self::load(dir.join(PEERS_FILE_NAME))
    }

    /// Write the cache back to the file it was loaded from. No-op for an
    /// in-memory cache.
    pub fn save(&self) -> Result<(), PeerCacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Cached key for `username`, if any and if it still parses.
    pub fn get(&self, username: &str) -> Option<PublicKey> {
        self.peers
            .get(username)
            .and_then(|encoded| decode_public_key(encoded).ok())
    }

    /// Insert or replace the key for `username`. Returns true if the cached
    /// value changed.
    pub fn upsert(&mut self, username: &str, key: &PublicKey) -> bool {
        let encoded = encode_public_key(key);
        match self.peers.insert(username.to_string(), encoded.clone()) {
            Some(previous) => previous != encoded,
            None => true,
        }
    }

    /// Drop the entry for `username`.
    pub fn remove(&mut self, username: &str) -> bool {
        self.peers.remove(username).is_some()
    }

    /// List cached usernames in sorted order.
    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }

    /// Number of cached peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
