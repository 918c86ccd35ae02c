//! Key generation and encoding for sealchat.
//!
//! This module handles X25519 key pair generation and the printable
//! base64 form in which keys cross the storage and directory boundaries.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Length in bytes of both halves of an X25519 key pair.
pub const KEY_LEN: usize = 32;

/// Errors that can occur during key operations.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid base64 encoding")]
    InvalidEncoding,

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Secure random generator unavailable: {0}")]
    RandomUnavailable(String),
}

/// A long-term X25519 key pair owned by the local identity.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose private key in debug output
        f.debug_struct("KeyPair")
            .field("public", &encode_public_key(&self.public))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl KeyPair {
    /// Generates a new random key pair.
    ///
    /// Fails only when the operating system RNG cannot be read.
    pub fn generate() -> Result<Self, KeyError> {
        let mut seed = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| KeyError::RandomUnavailable(e.to_string()))?;
        let secret = StaticSecret::from(seed);
        seed.zeroize();
        Ok(Self::from_secret(secret))
    }

    /// Builds a key pair from an existing secret key.
    pub fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuilds a key pair from its printable form.
    ///
    /// The stored public key must match the one derived from the secret.
    pub fn from_encoded(public_b64: &str, secret_b64: &str) -> Result<Self, KeyError> {
        let secret = decode_secret_key(secret_b64)?;
        let keypair = Self::from_secret(secret);
        let public = decode_public_key(public_b64)?;
        if public.as_bytes() != keypair.public.as_bytes() {
            return Err(KeyError::InvalidEncoding);
        }
        Ok(keypair)
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Returns the secret key.
    pub fn secret_key(&self) -> &StaticSecret {
        &self.secret
    }

    /// Public key in its printable form.
    pub fn public_key_b64(&self) -> String {
        encode_public_key(&self.public)
    }

    /// Secret key in its printable form. Only used by the key store.
    pub(crate) fn secret_key_b64(&self) -> String {
        let mut bytes = self.secret.to_bytes();
        let encoded = encode_bytes(&bytes);
        bytes.zeroize();
        encoded
    }
}

/// Encodes raw bytes in the printable alphabet used for keys and ciphertexts.
pub fn encode_bytes(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes printable bytes, accepting both the URL-safe and the standard
/// alphabet, padded or not.
pub fn decode_bytes(encoded: &str) -> Result<Vec<u8>, KeyError> {
    let trimmed = encoded.trim();
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE.decode(trimmed))
        .or_else(|_| STANDARD.decode(trimmed))
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|_| KeyError::InvalidEncoding)
}

/// Encodes a public key to its printable form.
pub fn encode_public_key(key: &PublicKey) -> String {
    encode_bytes(key.as_bytes())
}

/// Decodes a public key from its printable form.
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, KeyError> {
    let bytes = decode_key_bytes(encoded)?;
    Ok(PublicKey::from(bytes))
}

fn decode_secret_key(encoded: &str) -> Result<StaticSecret, KeyError> {
    let mut bytes = decode_key_bytes(encoded)?;
    let secret = StaticSecret::from(bytes);
    bytes.zeroize();
    Ok(secret)
}

fn decode_key_bytes(encoded: &str) -> Result<[u8; KEY_LEN], KeyError> {
    let mut bytes = decode_bytes(encoded)?;
    if bytes.len() != KEY_LEN {
        let got = bytes.len();
        bytes.zeroize();
        return Err(KeyError::InvalidKeyLength {
            expected: KEY_LEN,
            got,
        });
    }

    let mut key_bytes = [0u8; KEY_LEN];
    key_bytes.copy_from_slice(&bytes);
    bytes.zeroize();
    Ok(key_bytes)
}

/// SHA-256 fingerprint of a public key, for out-of-band verification.
pub fn fingerprint(key: &PublicKey) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Formats a fingerprint as uppercase hex in groups of four characters.
pub fn format_fingerprint(hash: &[u8; 32]) -> String {
    let hex: String = hash.iter().map(|b| format!("{:02X}", b)).collect();
    hex.as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
