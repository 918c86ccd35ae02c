//! # Sealchat - encrypted two-party chat
//!
//! Sealchat is the client core of a two-party chat in which every message is
//! end-to-end encrypted with sealed boxes (X25519 + HKDF-SHA256 +
//! ChaCha20Poly1305).
//!
//! ## Overview
//!
//! - Each device holds one long-term X25519 key pair, created on first use
//! - Public keys are published to a directory under the username
//! - Two users meet in a room named after both of them (`alice|bob`)
//! - Each message carries two ciphertexts: one for the recipient
//!   (`cipherTo`) and one for the sender (`cipherFrom`)
//! - Receivers try the ciphertext addressed to them, then the legacy
//!   single-ciphertext field, and show a placeholder if nothing opens
//!
//! ## Example Usage
//!
//! ```rust
//! use sealchat::chat::{compose_envelope, decode, room_id, Username};
//! use sealchat::crypto::KeyPair;
//!
//! let alice_keys = KeyPair::generate().unwrap();
//! let bob_keys = KeyPair::generate().unwrap();
//! let alice = Username::parse("alice").unwrap();
//! let bob = Username::parse("bob").unwrap();
//! let room = room_id("bob", "alice").unwrap();
//!
//! let envelope = compose_envelope(
//!     &room,
//!     &alice,
//!     &bob,
//!     1,
//!     "hi",
//!     alice_keys.public_key(),
//!     bob_keys.public_key(),
//! )
//! .unwrap();
//!
//! // Both sides can read it
//! assert_eq!(decode(&envelope, &bob, &bob_keys), "hi");
//! assert_eq!(decode(&envelope, &alice, &alice_keys), "hi");
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: Key pairs, sealed boxes, device key storage
//! - [`chat`]: Rooms, envelopes, the dual-cipher codec, sessions
//! - [`contacts`]: Cached peer public keys

pub mod chat;
pub mod contacts;
pub mod crypto;

// Re-export commonly used types at the crate root
pub use chat::{ChatConfig, ChatError, ChatSession, DisplayMessage, Identity, MessageEnvelope, RoomId};
pub use contacts::PeerCache;
pub use crypto::{KeyPair, KeyStore};
