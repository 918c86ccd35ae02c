//! Turning stored or streamed envelopes into displayable messages.
//!
//! History replay and live delivery share [`reconcile_one`], so the same
//! envelope always renders the same way whichever path it arrives by.

use crate::chat::protocol::{decode, MessageEnvelope, UNDECRYPTABLE_PLACEHOLDER};
use crate::chat::room::Username;
use crate::crypto::KeyPair;

/// A message ready for the feed. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// Declared sender.
    pub from: String,
    /// Plaintext, or [`UNDECRYPTABLE_PLACEHOLDER`].
    pub text: String,
    /// Sender timestamp in milliseconds.
    pub ts: u64,
}

impl DisplayMessage {
    /// Creates a display message.
    pub fn new(from: impl Into<String>, text: impl Into<String>, ts: u64) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
            ts,
        }
    }

    /// True if decryption failed for this message.
    pub fn is_placeholder(&self) -> bool {
        self.text == UNDECRYPTABLE_PLACEHOLDER
    }
}

/// Decodes a single envelope for display.
pub fn reconcile_one(envelope: &MessageEnvelope, local: &Username, keypair: &KeyPair) -> DisplayMessage {
    DisplayMessage::new(envelope.from.clone(), decode(envelope, local, keypair), envelope.ts)
}

/// Decodes a batch of envelopes, preserving order and length.
///
/// Each record is decoded independently; a failure on one yields a
/// placeholder in its slot and leaves its neighbours untouched.
pub fn reconcile(records: &[MessageEnvelope], local: &Username, keypair: &KeyPair) -> Vec<DisplayMessage> {
    records
        .iter()
        .map(|record| reconcile_one(record, local, keypair))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::protocol::compose_envelope;
    use crate::chat::room::RoomId;

    #[test]
    fn test_batch_isolation() {
        let alice = Username::parse("alice").unwrap();
        let bob = Username::parse("bob").unwrap();
        let alice_keys = KeyPair::generate().unwrap();
        let bob_keys = KeyPair::generate().unwrap();
        let room = RoomId::for_pair(&alice, &bob);

        let mut records: Vec<MessageEnvelope> = (0..5)
            .map(|i| {
                compose_envelope(
                    &room,
                    &alice,
                    &bob,
                    i,
                    &format!("message {}", i),
                    alice_keys.public_key(),
                    bob_keys.public_key(),
                )
                .unwrap()
            })
            .collect();
        records[2].cipher_to = Some("corrupted".to_string());

        let shown = reconcile(&records, &bob, &bob_keys);

        assert_eq!(shown.len(), 5);
        for (i, message) in shown.iter().enumerate() {
            assert_eq!(message.ts, i as u64);
            assert_eq!(message.from, "alice");
            if i == 2 {
                assert!(message.is_placeholder());
            } else {
                assert_eq!(message.text, format!("message {}", i));
            }
        }
    }

    #[test]
    fn test_single_message_matches_decode() {
        let bob = Username::parse("bob").unwrap();
        let keys = KeyPair::generate().unwrap();
        let mut unreadable = MessageEnvelope::plain("alice|bob", "alice", "bob", 3, "");
        unreadable.encrypted = true;
        unreadable.text = None;
        unreadable.cipher_to = Some("garbage".to_string());

        for envelope in [
            MessageEnvelope::plain("alice|bob", "alice", "bob", 2, "hello"),
            unreadable,
        ] {
            let shown = reconcile_one(&envelope, &bob, &keys);
            assert_eq!(shown.text, decode(&envelope, &bob, &keys));
            assert_eq!((shown.from.as_str(), shown.ts), ("alice", envelope.ts));
        }
    }

    #[test]
    fn test_empty_batch() {
        let bob = Username::parse("bob").unwrap();
        let keys = KeyPair::generate().unwrap();

        assert!(reconcile(&[], &bob, &keys).is_empty());
    }

    #[test]
    fn test_mixed_formats_in_order() {
        let bob = Username::parse("bob").unwrap();
        let keys = KeyPair::generate().unwrap();

        let records = vec![
            MessageEnvelope::plain("alice|bob", "alice", "bob", 1, "plain old"),
            MessageEnvelope {
                encrypted: true,
                text: Some(crate::crypto::seal_text("legacy", keys.public_key()).unwrap()),
                ..MessageEnvelope::plain("alice|bob", "alice", "bob", 2, "")
            },
        ];

        let shown = reconcile(&records, &bob, &keys);
        assert_eq!(shown[0].text, "plain old");
        assert_eq!(shown[1].text, "legacy");
    }
}
