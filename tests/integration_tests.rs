//! Integration tests for Sealchat
//!
//! Two sessions talk through in-memory transports. The test body plays
//! the relay: it reads what each client emits, records chat messages in the
//! history store and forwards them to the other side.
//!
//! Note: decoding never fails - a message that cannot be read shows as
//! the placeholder in its slot.

use std::sync::Arc;

use sealchat::chat::protocol::DecodePath;
use sealchat::chat::{
    compose_envelope, decode, reconcile, try_decode, ChatConfig, ChatError, ChatSession,
    EventTransport, Identity, MemoryDirectory, MemoryHistoryStore, MemoryTransport,
    MessageEnvelope, RoomId, TransportEvent, Username, UNDECRYPTABLE_PLACEHOLDER,
};
use sealchat::crypto::{
    decode_bytes, encode_bytes, open_text, seal_text, FileKeyStorage, KeyPair, KeyStore,
    MemoryKeyStorage,
};

type Session = ChatSession<MemoryTransport, Arc<MemoryDirectory>, Arc<MemoryHistoryStore>>;

struct Client {
    session: Session,
    relay: MemoryTransport,
}

fn client(name: &str, directory: &Arc<MemoryDirectory>, history: &Arc<MemoryHistoryStore>) -> Client {
    let store = KeyStore::new(MemoryKeyStorage::new());
    let identity = Identity::load(name, &store).unwrap();
    let (local, relay) = MemoryTransport::pair();
    let session = ChatSession::new(
        identity,
        local,
        Arc::clone(directory),
        Arc::clone(history),
        &ChatConfig::default(),
    );
    Client { session, relay }
}

/// Drains everything a client emitted, returning the chat messages.
fn drain_sent(client: &mut Client) -> Vec<MessageEnvelope> {
    let mut sent = Vec::new();
    while let Some(event) = client.relay.try_receive() {
        if let TransportEvent::ChatSend(envelope) = event {
            sent.push(envelope);
        }
    }
    sent
}

fn user(name: &str) -> Username {
    Username::parse(name).unwrap()
}

/// alice sends "hi" to bob: bob reads it live, alice reads it back from
/// history, and each ciphertext opens only for its intended reader.
#[tokio::test]
async fn test_alice_bob_scenario() {
    let directory = Arc::new(MemoryDirectory::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let mut alice = client("alice", &directory, &history);
    let mut bob = client("bob", &directory, &history);

    alice.session.register().await.unwrap();
    bob.session.register().await.unwrap();

    let room = alice.session.join("bob").await.unwrap();
    assert_eq!(room.as_str(), "alice|bob");
    assert_eq!(bob.session.join("alice").await.unwrap(), room);

    let envelope = alice.session.send("hi").await.unwrap();
    assert!(envelope.encrypted);
    assert_eq!(envelope.room, "alice|bob");
    assert_eq!((envelope.from.as_str(), envelope.to.as_str()), ("alice", "bob"));
    assert!(envelope.text.is_none());

    // Relay: record and forward
    let sent = drain_sent(&mut alice);
    assert_eq!(sent, vec![envelope.clone()]);
    history.record(envelope.clone());
    bob.relay
        .send(&TransportEvent::ChatRecv(envelope.clone()))
        .await
        .unwrap();

    // Bob reads it live
    let shown = bob.session.next_event().await.unwrap().unwrap();
    assert_eq!(shown.text, "hi");
    assert_eq!(shown.from, "alice");

    // Each box opens only for its reader
    let alice_keys = &alice.session.identity().keypair;
    let bob_keys = &bob.session.identity().keypair;
    let cipher_to = envelope.cipher_to.as_deref().unwrap();
    let cipher_from = envelope.cipher_from.as_deref().unwrap();
    assert_eq!(open_text(cipher_to, bob_keys).unwrap(), "hi");
    assert!(open_text(cipher_to, alice_keys).is_err());
    assert_eq!(open_text(cipher_from, alice_keys).unwrap(), "hi");
    assert!(open_text(cipher_from, bob_keys).is_err());

    // Alice rejoins and reads her own message from history
    alice.session.join("bob").await.unwrap();
    let replay = alice.session.messages().await;
    assert_eq!(replay.len(), 1);
    assert_eq!(replay[0].text, "hi");
    assert_eq!(replay[0].from, "alice");
}

/// A peer without a directory entry: send is refused, nothing is emitted,
/// and the error is recoverable.
#[tokio::test]
async fn test_send_refused_when_peer_key_missing() {
    let directory = Arc::new(MemoryDirectory::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let mut alice = client("alice", &directory, &history);

    alice.session.join("bob").await.unwrap();
    assert!(matches!(
        alice.relay.try_receive(),
        Some(TransportEvent::RoomJoin(_))
    ));

    let err = alice.session.send("hello?").await.unwrap_err();
    assert!(matches!(err, ChatError::PeerKeyUnavailable(ref who) if who == "bob"));
    assert!(err.is_recoverable());

    assert!(alice.relay.try_receive().is_none());
    assert!(alice.session.messages().await.is_empty());
}

/// A key that disappears from the directory is not used from the cache.
#[tokio::test]
async fn test_deregistered_peer_key_is_dropped_on_join() {
    let directory = Arc::new(MemoryDirectory::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let mut alice = client("alice", &directory, &history);
    let bob = client("bob", &directory, &history);

    bob.session.register().await.unwrap();
    alice.session.join("bob").await.unwrap();
    assert!(alice.session.peer_cache().get("bob").is_some());

    directory.remove(&user("bob"));
    alice.session.join("bob").await.unwrap();

    assert!(alice.session.peer_cache().get("bob").is_none());
    assert!(matches!(
        alice.session.send("still there?").await,
        Err(ChatError::PeerKeyUnavailable(_))
    ));
}

/// One corrupted record in the middle of a history batch.
#[tokio::test]
async fn test_history_batch_isolation() {
    let directory = Arc::new(MemoryDirectory::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let mut bob = client("bob", &directory, &history);

    let alice = user("alice");
    let bob_name = user("bob");
    let alice_keys = KeyPair::generate().unwrap();
    let bob_keys = bob.session.identity().keypair.clone();
    let room = RoomId::for_pair(&alice, &bob_name);

    for (i, text) in ["one", "two", "three", "four", "five"].iter().enumerate() {
        let mut envelope = compose_envelope(
            &room,
            &alice,
            &bob_name,
            i as u64 + 1,
            text,
            alice_keys.public_key(),
            bob_keys.public_key(),
        )
        .unwrap();

        if i == 2 {
            // Flip a byte in the middle of the recipient box
            let mut raw = decode_bytes(envelope.cipher_to.as_deref().unwrap()).unwrap();
            let mid = raw.len() / 2;
            raw[mid] ^= 0x01;
            envelope.cipher_to = Some(encode_bytes(&raw));
        }
        history.record(envelope);
    }

    bob.session.join("alice").await.unwrap();
    let feed = bob.session.messages().await;

    let texts: Vec<_> = feed.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["one", "two", UNDECRYPTABLE_PLACEHOLDER, "four", "five"]
    );
    let stamps: Vec<_> = feed.iter().map(|m| m.ts).collect();
    assert_eq!(stamps, vec![1, 2, 3, 4, 5]);
}

/// Legacy records carry one ciphertext in `text`, sealed to the reader.
#[tokio::test]
async fn test_legacy_single_cipher_history() {
    let directory = Arc::new(MemoryDirectory::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let mut bob = client("bob", &directory, &history);
    let bob_public = *bob.session.identity().keypair.public_key();

    let legacy = MessageEnvelope {
        room: "alice|bob".to_string(),
        from: "alice".to_string(),
        to: "bob".to_string(),
        ts: 10,
        encrypted: true,
        cipher_to: None,
        cipher_from: None,
        text: Some(seal_text("from the old days", &bob_public).unwrap()),
    };
    let plain = MessageEnvelope::plain("alice|bob", "alice", "bob", 11, "not encrypted");
    history.record(legacy.clone());
    history.record(plain);

    let decoded = try_decode(&legacy, &user("bob"), &bob.session.identity().keypair).unwrap();
    assert_eq!(decoded.path, DecodePath::Legacy);

    bob.session.join("alice").await.unwrap();
    let texts: Vec<_> = bob
        .session
        .messages()
        .await
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, vec!["from the old days", "not encrypted"]);
}

/// Live delivery and history replay render every envelope identically.
#[tokio::test]
async fn test_live_and_history_agree() {
    let directory = Arc::new(MemoryDirectory::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let mut alice = client("alice", &directory, &history);
    let mut bob = client("bob", &directory, &history);
    alice.session.register().await.unwrap();
    bob.session.register().await.unwrap();

    alice.session.join("bob").await.unwrap();
    bob.session.join("alice").await.unwrap();

    alice.session.send("first").await.unwrap();
    bob.session.send("second").await.unwrap();

    let mut envelopes = drain_sent(&mut alice);
    envelopes.extend(drain_sent(&mut bob));
    let stranger = KeyPair::generate().unwrap();
    let mut garbage = envelopes[0].clone();
    garbage.cipher_to = Some(seal_text("not for bob", stranger.public_key()).unwrap());
    garbage.cipher_from = None;
    envelopes.push(garbage);

    let bob_name = user("bob");
    let bob_keys = bob.session.identity().keypair.clone();
    let replayed = reconcile(&envelopes, &bob_name, &bob_keys);

    for (envelope, from_history) in envelopes.iter().zip(&replayed) {
        let live = bob
            .session
            .handle_event(TransportEvent::ChatRecv(envelope.clone()))
            .unwrap();
        assert_eq!(&live, from_history);
        assert_eq!(live.text, decode(envelope, &bob_name, &bob_keys));
    }
    assert_eq!(replayed[2].text, UNDECRYPTABLE_PLACEHOLDER);
}

/// Messages that reach the relay while history is loading: the ones already
/// in history are shown once, newer ones follow the history.
#[tokio::test]
async fn test_feed_order_across_join() {
    let directory = Arc::new(MemoryDirectory::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let mut bob = client("bob", &directory, &history);

    let old = MessageEnvelope::plain("alice|bob", "alice", "bob", 1, "old");
    let recorded = MessageEnvelope::plain("alice|bob", "alice", "bob", 2, "recorded");
    let new = MessageEnvelope::plain("alice|bob", "alice", "bob", 3, "new");
    history.record(old);
    history.record(recorded.clone());

    // Delivered by the relay before bob's join returns
    for envelope in [recorded, new] {
        bob.relay
            .send(&TransportEvent::ChatRecv(envelope))
            .await
            .unwrap();
    }

    bob.session.join("alice").await.unwrap();
    assert!(bob.session.next_event().await.unwrap().is_none());
    assert_eq!(bob.session.next_event().await.unwrap().unwrap().text, "new");

    let texts: Vec<_> = bob
        .session
        .messages()
        .await
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, vec!["old", "recorded", "new"]);

    // Joining another room clears the feed
    bob.session.join("carol").await.unwrap();
    assert!(bob.session.messages().await.is_empty());
}

/// The device key pair survives a restart and is not regenerated.
#[test]
fn test_file_key_store_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    let first = KeyStore::new(FileKeyStorage::new(dir.path()))
        .get_or_create_identity()
        .unwrap();
    let second = KeyStore::new(FileKeyStorage::new(dir.path()))
        .get_or_create_identity()
        .unwrap();

    assert_eq!(first.public_key_b64(), second.public_key_b64());
    assert!(dir.path().join("keypair.json").exists());
}
