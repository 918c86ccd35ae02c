//! Chat protocol types and operations.
//!
//! - **Envelope**: the message record on the wire and in history
//! - **Codec**: dual-cipher encoding and the ordered decode fallback
//! - **Events**: the transport event vocabulary

mod codec;
mod envelope;
mod event;

pub use codec::{
    compose_envelope, decode, encode, try_decode, AttemptError, DecodeFailure, DecodePath,
    Decoded, DualCipher, UNDECRYPTABLE_PLACEHOLDER,
};
pub use envelope::{now_millis, MessageEnvelope, MessageFormat};
pub use event::{PresenceOnline, PresenceUpdate, TransportEvent, TypingNotice};
