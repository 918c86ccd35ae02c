//! Property-based tests for the sealed-box codec and room ids
//!
//! Uses proptest to check invariants across random inputs

use proptest::prelude::*;
use sealchat::chat::protocol::{try_decode, DecodePath};
use sealchat::chat::{compose_envelope, room_id, RoomId, Username};
use sealchat::crypto::{decode_bytes, open, seal, KeyPair, SealError};

fn username() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_.-]{0,15}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_room_id_is_order_independent(a in username(), b in username()) {
        prop_assert_eq!(room_id(&a, &b).unwrap(), room_id(&b, &a).unwrap());
    }

    #[test]
    fn test_room_id_ignores_case_and_padding(a in username(), b in username()) {
        let padded = format!("  {}  ", a.to_uppercase());
        prop_assert_eq!(room_id(&padded, &b).unwrap(), room_id(&a, &b).unwrap());
    }

    #[test]
    fn test_room_id_distinct_for_distinct_peers(
        a in username(),
        b in username(),
        c in username(),
    ) {
        prop_assume!(b.to_lowercase() != c.to_lowercase());
        prop_assert_ne!(room_id(&a, &b).unwrap(), room_id(&a, &c).unwrap());
    }

    #[test]
    fn test_seal_open_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..2048)) {
        let recipient = KeyPair::generate().unwrap();

        let sealed = seal(&plaintext, recipient.public_key()).unwrap();
        prop_assert_eq!(open(&sealed, &recipient).unwrap(), plaintext);
    }

    #[test]
    fn test_dual_cipher_roundtrip(text in "\\PC{1,200}") {
        let alice_keys = KeyPair::generate().unwrap();
        let bob_keys = KeyPair::generate().unwrap();
        let alice = Username::parse("alice").unwrap();
        let bob = Username::parse("bob").unwrap();
        let room = RoomId::for_pair(&alice, &bob);

        let envelope = compose_envelope(
            &room, &alice, &bob, 1, &text, alice_keys.public_key(), bob_keys.public_key(),
        ).unwrap();

        let as_bob = try_decode(&envelope, &bob, &bob_keys).unwrap();
        prop_assert_eq!(as_bob.path, DecodePath::CipherTo);
        prop_assert_eq!(&as_bob.text, &text);

        let as_alice = try_decode(&envelope, &alice, &alice_keys).unwrap();
        prop_assert_eq!(as_alice.path, DecodePath::CipherFrom);
        prop_assert_eq!(&as_alice.text, &text);
    }

    #[test]
    fn test_tampered_box_never_opens(
        text in "\\PC{0,64}",
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
        tamper_from in any::<bool>(),
    ) {
        let alice_keys = KeyPair::generate().unwrap();
        let bob_keys = KeyPair::generate().unwrap();
        let alice = Username::parse("alice").unwrap();
        let bob = Username::parse("bob").unwrap();
        let room = RoomId::for_pair(&alice, &bob);

        let envelope = compose_envelope(
            &room, &alice, &bob, 1, &text, alice_keys.public_key(), bob_keys.public_key(),
        ).unwrap();

        let (encoded, reader) = if tamper_from {
            (envelope.cipher_from.unwrap(), alice_keys)
        } else {
            (envelope.cipher_to.unwrap(), bob_keys)
        };
        let mut raw = decode_bytes(&encoded).unwrap();
        let i = index.index(raw.len());
        raw[i] ^= 1 << bit;

        prop_assert!(matches!(open(&raw, &reader), Err(SealError::Decrypt)));
    }
}
