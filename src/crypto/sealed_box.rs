//! Anonymous public-key encryption ("sealed box").
//!
//! A sealed box is opened only by the holder of the recipient's secret key.
//! It carries no sender identity and no signature: anyone holding the
//! recipient's public key can produce a valid box.
//!
//! Construction:
//! 1. Generate an ephemeral X25519 key pair
//! 2. ECDH between the ephemeral secret and the recipient's public key
//! 3. HKDF-SHA256 over the shared secret, salted with both public keys,
//!    yields the ChaCha20Poly1305 key and nonce
//! 4. Output is `ephemeral_public (32) || ciphertext || tag (16)`
//!
//! Since every box uses a fresh ephemeral key the nonce never repeats and
//! does not need to travel with the ciphertext.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

use super::keys::{decode_bytes, encode_bytes, KeyPair, KEY_LEN};

/// HKDF info string for key derivation.
const HKDF_INFO: &[u8] = b"SEALCHAT-V1-SEALED-BOX";

/// Nonce size for ChaCha20Poly1305.
const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size.
const TAG_SIZE: usize = 16;

/// Bytes a sealed box adds on top of the plaintext.
pub const SEAL_OVERHEAD: usize = KEY_LEN + TAG_SIZE;

/// Errors that can occur while sealing or opening a box.
#[derive(Error, Debug)]
pub enum SealError {
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    /// The box was not sealed to this key pair, or it was corrupted.
    /// Deliberately carries no detail.
    #[error("Decryption failed")]
    Decrypt,

    /// The box opened but its plaintext is not valid UTF-8.
    #[error("Decrypted plaintext is not valid UTF-8")]
    Decode,
}

/// Seals `plaintext` to `recipient_public`.
pub fn seal(plaintext: &[u8], recipient_public: &PublicKey) -> Result<Vec<u8>, SealError> {
    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let shared_secret = ephemeral_secret.diffie_hellman(recipient_public);
    if !shared_secret.was_contributory() {
        return Err(SealError::Encrypt(
            "recipient public key is a low-order point".to_string(),
        ));
    }

    let (cipher, nonce) = derive_cipher(
        shared_secret.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient_public.as_bytes(),
    )
    .map_err(|_| SealError::Encrypt("key derivation failed".to_string()))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| SealError::Encrypt(e.to_string()))?;

    let mut result = Vec::with_capacity(KEY_LEN + ciphertext.len());
    result.extend_from_slice(ephemeral_public.as_bytes());
    result.extend(ciphertext);
    Ok(result)
}

/// Opens a box with the recipient's key pair.
///
/// Every failure, including a truncated box, is reported as
/// [`SealError::Decrypt`].
pub fn open(sealed: &[u8], recipient: &KeyPair) -> Result<Vec<u8>, SealError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(SealError::Decrypt);
    }

    let mut ephemeral_bytes = [0u8; KEY_LEN];
    ephemeral_bytes.copy_from_slice(&sealed[..KEY_LEN]);
    let ephemeral_public = PublicKey::from(ephemeral_bytes);

    let shared_secret = recipient.secret_key().diffie_hellman(&ephemeral_public);
    if !shared_secret.was_contributory() {
        return Err(SealError::Decrypt);
    }

    let (cipher, nonce) = derive_cipher(
        shared_secret.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient.public_key().as_bytes(),
    )
    .map_err(|_| SealError::Decrypt)?;

    cipher
        .decrypt(Nonce::from_slice(&nonce), &sealed[KEY_LEN..])
        .map_err(|_| SealError::Decrypt)
}

/// Seals UTF-8 text and returns the box in printable form.
pub fn seal_text(plaintext: &str, recipient_public: &PublicKey) -> Result<String, SealError> {
    let sealed = seal(plaintext.as_bytes(), recipient_public)?;
    Ok(encode_bytes(&sealed))
}

/// Opens a printable box and decodes its plaintext as UTF-8.
///
/// A value that is not valid base64 cannot be a box for us and is reported
/// as [`SealError::Decrypt`]; a box that opens to invalid UTF-8 is
/// [`SealError::Decode`].
pub fn open_text(sealed_b64: &str, recipient: &KeyPair) -> Result<String, SealError> {
    let sealed = decode_bytes(sealed_b64).map_err(|_| SealError::Decrypt)?;
    let plaintext = open(&sealed, recipient)?;
    String::from_utf8(plaintext).map_err(|_| SealError::Decode)
}

/// Derives the AEAD cipher and nonce for one box.
fn derive_cipher(
    shared_secret: &[u8; 32],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> Result<(ChaCha20Poly1305, [u8; NONCE_SIZE]), hkdf::InvalidLength> {
    let mut salt = [0u8; 2 * KEY_LEN];
    salt[..KEY_LEN].copy_from_slice(ephemeral_public);
    salt[KEY_LEN..].copy_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut okm = Zeroizing::new([0u8; KEY_LEN + NONCE_SIZE]);
    hk.expand(HKDF_INFO, &mut okm[..])?;

    let cipher = ChaCha20Poly1305::new_from_slice(&okm[..KEY_LEN])
        .map_err(|_| hkdf::InvalidLength)?;
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&okm[KEY_LEN..]);

    Ok((cipher, nonce))
}
