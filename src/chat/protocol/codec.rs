//! Dual-cipher message codec.
//!
//! A sealed box can only be opened by the key pair it was sealed to, so the
//! sender of a message could never re-read it from history. Every outgoing
//! message is therefore sealed twice: once to the peer (`cipherTo`) and once
//! to the sender's own key (`cipherFrom`).
//!
//! Decoding picks which box to open from the declared `to` / `from` fields:
//!
//! 1. plain envelope: return the text
//! 2. we are `to` and `cipherTo` is present: open it
//! 3. we are `from` and `cipherFrom` is present: open it
//! 4. a legacy single box in `text`: open it with our key
//! 5. otherwise, or if every attempt failed: placeholder
//!
//! Attempts are made in that order and the first one that opens wins.
//! Decoding never returns an error to the caller of [`decode`]; one bad
//! record must not take down the rest of a batch.

use tracing::debug;
use x25519_dalek::PublicKey;

use crate::chat::error::ChatError;
use crate::chat::protocol::envelope::{MessageEnvelope, MessageFormat};
use crate::chat::room::{RoomId, Username};
use crate::crypto::{open_text, seal_text, KeyPair, SealError};

/// Text shown in place of a message that could not be decrypted.
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[unable to decrypt message]";

/// The two boxes of a dual-cipher message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualCipher {
    /// Sealed to the recipient.
    pub cipher_to: String,
    /// Sealed to the sender.
    pub cipher_from: String,
}

/// Which part of an envelope produced the plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    /// Unencrypted text.
    Plain,
    /// The box sealed to the recipient.
    CipherTo,
    /// The box sealed to the sender.
    CipherFrom,
    /// A single pre-dual-cipher box in `text`.
    Legacy,
}

/// A successfully decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The plaintext.
    pub text: String,
    /// Where it came from.
    pub path: DecodePath,
}

/// Why an individual attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptError {
    /// The box did not open with the local key pair.
    Decrypt,
    /// The box opened but did not hold UTF-8 text.
    Decode,
}

/// Every attempt made on an envelope failed, or none applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Attempts in the order they were made. Empty when no path applied.
    pub attempts: Vec<(DecodePath, AttemptError)>,
}

/// Seals `plaintext` to both the peer and the local key.
///
/// Both boxes are produced or neither is.
pub fn encode(
    plaintext: &str,
    local_public: &PublicKey,
    peer_public: &PublicKey,
) -> Result<DualCipher, ChatError> {
    let cipher_to = seal_text(plaintext, peer_public).map_err(encrypt_error)?;
    let cipher_from = seal_text(plaintext, local_public).map_err(encrypt_error)?;
    Ok(DualCipher {
        cipher_to,
        cipher_from,
    })
}

fn encrypt_error(err: SealError) -> ChatError {
    match err {
        SealError::Encrypt(msg) => ChatError::Encrypt(msg),
        other => ChatError::Encrypt(other.to_string()),
    }
}

/// Builds a complete outgoing envelope in the current format.
pub fn compose_envelope(
    room: &RoomId,
    from: &Username,
    to: &Username,
    ts: u64,
    plaintext: &str,
    local_public: &PublicKey,
    peer_public: &PublicKey,
) -> Result<MessageEnvelope, ChatError> {
    let dual = encode(plaintext, local_public, peer_public)?;
    Ok(MessageEnvelope {
        room: room.as_str().to_string(),
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
        ts,
        encrypted: true,
        cipher_to: Some(dual.cipher_to),
        cipher_from: Some(dual.cipher_from),
        text: None,
    })
}

/// Decodes an envelope, reporting which path succeeded or every attempt
/// that failed.
pub fn try_decode(
    envelope: &MessageEnvelope,
    local: &Username,
    keypair: &KeyPair,
) -> Result<Decoded, DecodeFailure> {
    let candidates: Vec<(DecodePath, &str)> = match envelope.format() {
        MessageFormat::Plain { text } => {
            return Ok(Decoded {
                text: text.to_string(),
                path: DecodePath::Plain,
            });
        }
        MessageFormat::Dual {
            cipher_to,
            cipher_from,
            legacy,
        } => {
            let mut candidates = Vec::with_capacity(3);
            if let Some(cipher) = cipher_to.filter(|_| local.matches(&envelope.to)) {
                candidates.push((DecodePath::CipherTo, cipher));
            }
            if let Some(cipher) = cipher_from.filter(|_| local.matches(&envelope.from)) {
                candidates.push((DecodePath::CipherFrom, cipher));
            }
            if let Some(cipher) = legacy {
                candidates.push((DecodePath::Legacy, cipher));
            }
            candidates
        }
        MessageFormat::LegacySingle { cipher } => vec![(DecodePath::Legacy, cipher)],
        MessageFormat::Unreadable => Vec::new(),
    };

    let mut attempts = Vec::with_capacity(candidates.len());
    for (path, cipher) in candidates {
        match open_text(cipher, keypair) {
            Ok(text) => return Ok(Decoded { text, path }),
            Err(err) => {
                let reason = match err {
                    SealError::Decode => AttemptError::Decode,
                    _ => AttemptError::Decrypt,
                };
                debug!(?path, ?reason, from = %envelope.from, ts = envelope.ts, "decode attempt failed");
                attempts.push((path, reason));
            }
        }
    }

    Err(DecodeFailure { attempts })
}

/// Decodes an envelope to display text. Never fails: an envelope that
/// cannot be read yields [`UNDECRYPTABLE_PLACEHOLDER`].
pub fn decode(envelope: &MessageEnvelope, local: &Username, keypair: &KeyPair) -> String {
    match try_decode(envelope, local, keypair) {
        Ok(decoded) => decoded.text,
        Err(_) => UNDECRYPTABLE_PLACEHOLDER.to_string(),
    }
}
