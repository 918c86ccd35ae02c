//! Chat error types.

use thiserror::Error;

use crate::crypto::{KeyStoreError, SealError};

/// Errors that can occur during chat operations.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Key pair or session token persistence is unavailable.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The crypto primitive could not be initialised.
    #[error("Crypto initialization failed: {0}")]
    CryptoInit(String),

    /// Sealing failed; nothing was sent.
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    /// A sealed box could not be opened with the local key pair.
    #[error("Decryption failed")]
    Decrypt,

    /// A sealed box opened to something that is not valid text.
    #[error("Decrypted message is not valid UTF-8")]
    Decode,

    /// Username failed validation.
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// An operation needed a room but none has been joined.
    #[error("Not joined to a room")]
    NotJoined,

    /// Outgoing message was empty after trimming.
    #[error("Message is empty")]
    EmptyMessage,

    /// Outgoing message exceeds the configured maximum.
    #[error("Message too long ({len} bytes, max: {max})")]
    MessageTooLong {
        /// Length of the rejected message.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The directory has no public key for the peer. Recoverable: the peer
    /// may register later.
    #[error("No public key published for {0}")]
    PeerKeyUnavailable(String),

    /// The directory returned a key that is not a valid public key.
    #[error("Invalid public key for {0}")]
    InvalidPeerKey(String),

    /// Directory service error.
    #[error("Directory error: {0}")]
    Directory(String),

    /// History store error.
    #[error("History error: {0}")]
    History(String),

    /// Transport error.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Serialization failed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Configuration file could not be read or written.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ChatError {
    /// True for conditions the user can recover from without restarting
    /// the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PeerKeyUnavailable(_)
                | Self::InvalidPeerKey(_)
                | Self::EmptyMessage
                | Self::MessageTooLong { .. }
                | Self::NotJoined
                | Self::Directory(_)
                | Self::History(_)
                | Self::Encrypt(_)
        )
    }
}

impl From<KeyStoreError> for ChatError {
    fn from(err: KeyStoreError) -> Self {
        if err.is_crypto_init() {
            Self::CryptoInit(err.to_string())
        } else {
            Self::Storage(err.to_string())
        }
    }
}

impl From<SealError> for ChatError {
    fn from(err: SealError) -> Self {
        match err {
            SealError::Encrypt(msg) => Self::Encrypt(msg),
            SealError::Decrypt => Self::Decrypt,
            SealError::Decode => Self::Decode,
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}
