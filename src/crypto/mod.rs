//! Cryptographic operations for sealchat.
//!
//! This module provides:
//! - Key generation and printable encoding (X25519)
//! - Sealed boxes: anonymous encryption to a public key
//!   (X25519 + HKDF-SHA256 + ChaCha20Poly1305)
//! - Device storage for the long-term identity key pair

pub mod key_store;
pub mod keys;
pub mod sealed_box;

pub use key_store::{
    get_or_create_identity, FileKeyStorage, KeyStorage, KeyStore, KeyStoreError,
    MemoryKeyStorage, StoredKeypair,
};
pub use keys::{
    decode_bytes, decode_public_key, encode_bytes, encode_public_key, fingerprint,
    format_fingerprint, KeyError, KeyPair, KEY_LEN,
};
pub use sealed_box::{open, open_text, seal, seal_text, SealError, SEAL_OVERHEAD};
