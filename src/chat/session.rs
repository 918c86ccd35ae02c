//! Chat session: one local identity talking to one peer at a time.
//!
//! The session owns the transport and the per-room state (peer key, typing
//! indicator, presence) and feeds displayable messages to the feed task.
//! It must be created inside a tokio runtime, since it spawns the feed.

use std::time::Instant;

use tracing::{debug, info, warn};
use x25519_dalek::PublicKey;

use crate::chat::config::ChatConfig;
use crate::chat::directory::Directory;
use crate::chat::error::ChatError;
use crate::chat::feed::FeedHandle;
use crate::chat::history::{reconcile, reconcile_one, DisplayMessage};
use crate::chat::history_store::HistoryStore;
use crate::chat::presence::{PresenceTable, TypingIndicator};
use crate::chat::protocol::{
    compose_envelope, now_millis, MessageEnvelope, TransportEvent, TypingNotice,
};
use crate::chat::room::{RoomId, Username};
use crate::chat::transport::EventTransport;
use crate::contacts::PeerCache;
use crate::crypto::{decode_public_key, KeyPair, KeyStorage, KeyStore};

/// The local user: a normalised username and the device key pair.
#[derive(Debug, Clone)]
pub struct Identity {
    pub username: Username,
    pub keypair: KeyPair,
}

impl Identity {
    /// Creates an identity from a raw username and a key pair.
    pub fn new(username: &str, keypair: KeyPair) -> Result<Self, ChatError> {
        Ok(Self {
            username: Username::parse(username)?,
            keypair,
        })
    }

    /// Loads (or creates on first use) the device key pair and binds it to
    /// `username`.
    pub fn load<S: KeyStorage>(username: &str, store: &KeyStore<S>) -> Result<Self, ChatError> {
        let username = Username::parse(username)?;
        let keypair = store.get_or_create_identity()?;
        info!(user = %username, "identity loaded");
        Ok(Self { username, keypair })
    }
}

/// The room currently joined.
#[derive(Debug, Clone)]
struct JoinedRoom {
    id: RoomId,
    peer: Username,
    peer_key: Option<PublicKey>,
    /// Timestamp of the last replayed history record. Live messages at or
    /// before it are already in the feed.
    history_cutoff: Option<u64>,
}

/// Point-in-time view of a session, for debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub username: String,
    pub room: Option<String>,
    pub peer: Option<String>,
    pub peer_key_known: bool,
    pub peer_online: Option<bool>,
    pub feed_len: usize,
}

/// A chat session over an event transport.
pub struct ChatSession<T, D, H> {
    identity: Identity,
    transport: T,
    directory: D,
    history: H,
    peers: PeerCache,
    room: Option<JoinedRoom>,
    feed: FeedHandle,
    typing: TypingIndicator,
    presence: PresenceTable,
    max_message_len: usize,
}

impl<T, D, H> ChatSession<T, D, H>
where
    T: EventTransport,
    D: Directory,
    H: HistoryStore,
{
    /// Creates a session. Spawns the feed task on the current runtime.
    pub fn new(identity: Identity, transport: T, directory: D, history: H, config: &ChatConfig) -> Self {
        Self {
            identity,
            transport,
            directory,
            history,
            peers: PeerCache::in_memory(),
            room: None,
            feed: FeedHandle::spawn(),
            typing: TypingIndicator::new(config.typing_timeout()),
            presence: PresenceTable::new(),
            max_message_len: config.max_message_len,
        }
    }

    /// Uses `peers` as the peer key cache instead of an in-memory one.
    pub fn with_peer_cache(mut self, peers: PeerCache) -> Self {
        self.peers = peers;
        self
    }

    /// Publishes the local public key to the directory.
    pub async fn register(&self) -> Result<(), ChatError> {
        self.directory
            .upsert(&self.identity.username, &self.identity.keypair.public_key_b64())
            .await
    }

    /// Joins the room shared with `peer`.
    ///
    /// Refreshes the peer's key from the directory, tells the relay, then
    /// clears the feed and replays the room's history into it. If the relay
    /// cannot be told, the previous room stays current. A history failure
    /// is logged and the room starts empty. A peer with no published key
    /// does not prevent joining; sending will be refused until the key
    /// appears.
    pub async fn join(&mut self, peer: &str) -> Result<RoomId, ChatError> {
        let peer = Username::parse(peer)?;
        let id = RoomId::for_pair(&self.identity.username, &peer);

        let peer_key = match self.refresh_peer_key(&peer).await {
            Ok(key) => key,
            Err(err) => {
                warn!(peer = %peer, error = %err, "directory lookup failed, using cached key");
                self.peers.get(peer.as_str())
            }
        };
        if peer_key.is_none() {
            warn!(peer = %peer, "peer has no published key");
        }

        self.transport
            .send(&TransportEvent::RoomJoin(id.as_str().to_string()))
            .await?;
        info!(room = %id, peer = %peer, "joined room");

        self.feed.reset();
        self.typing.clear();
        self.room = Some(JoinedRoom {
            id: id.clone(),
            peer: peer.clone(),
            peer_key,
            history_cutoff: None,
        });

        let records = match self.history.fetch(&id).await {
            Ok(records) => records,
            Err(err) => {
                warn!(room = %id, error = %err, "history fetch failed");
                Vec::new()
            }
        };
        let history = reconcile(&records, &self.identity.username, &self.identity.keypair);
        debug!(room = %id, count = history.len(), "history replayed");

        if let Some(room) = self.room.as_mut() {
            room.history_cutoff = history.last().map(|m| m.ts);
        }
        self.feed.load_history(history);

        Ok(id)
    }

    /// Encrypts and sends `text` to the current peer.
    ///
    /// The message is trimmed first. Nothing is emitted on any error; in
    /// particular a peer without a published key yields
    /// [`ChatError::PeerKeyUnavailable`] after one fresh directory lookup.
    pub async fn send(&mut self, text: &str) -> Result<MessageEnvelope, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.len() > self.max_message_len {
            return Err(ChatError::MessageTooLong {
                len: text.len(),
                max: self.max_message_len,
            });
        }

        let (id, peer, cached_key) = match &self.room {
            Some(room) => (room.id.clone(), room.peer.clone(), room.peer_key),
            None => return Err(ChatError::NotJoined),
        };

        let peer_key = match cached_key {
            Some(key) => key,
            None => {
                let key = self
                    .refresh_peer_key(&peer)
                    .await?
                    .ok_or_else(|| ChatError::PeerKeyUnavailable(peer.to_string()))?;
                if let Some(room) = self.room.as_mut() {
                    room.peer_key = Some(key);
                }
                key
            }
        };

        let envelope = compose_envelope(
            &id,
            &self.identity.username,
            &peer,
            now_millis(),
            text,
            self.identity.keypair.public_key(),
            &peer_key,
        )?;

        self.transport
            .send(&TransportEvent::ChatSend(envelope.clone()))
            .await?;

        self.feed.append(DisplayMessage::new(
            self.identity.username.as_str(),
            text,
            envelope.ts,
        ));
        Ok(envelope)
    }

    /// Tells the peer we are typing.
    pub async fn send_typing(&mut self) -> Result<(), ChatError> {
        let room = self.room.as_ref().ok_or(ChatError::NotJoined)?;
        let notice = TypingNotice {
            room: room.id.as_str().to_string(),
            from: self.identity.username.as_str().to_string(),
        };
        self.transport.send(&TransportEvent::Typing(notice)).await
    }

    /// Applies an incoming event. Returns the message to display, if the
    /// event delivered one for the current room.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<DisplayMessage> {
        self.handle_event_at(event, Instant::now())
    }

    /// [`handle_event`](Self::handle_event) with an explicit clock.
    pub fn handle_event_at(&mut self, event: TransportEvent, now: Instant) -> Option<DisplayMessage> {
        match event {
            TransportEvent::ChatRecv(envelope) => {
                let room = self.room.as_ref()?;
                if !room.id.matches(&envelope.room) {
                    debug!(room = %envelope.room, "message for another room ignored");
                    return None;
                }
                if room.history_cutoff.is_some_and(|ts| envelope.ts <= ts) {
                    debug!(from = %envelope.from, ts = envelope.ts, "message already replayed from history");
                    return None;
                }
                if room.peer.matches(&envelope.from) {
                    self.typing.clear();
                }

                let message = reconcile_one(&envelope, &self.identity.username, &self.identity.keypair);
                self.feed.append(message.clone());
                Some(message)
            }
            TransportEvent::Typing(notice) => {
                if let Some(room) = &self.room {
                    if room.id.matches(&notice.room) && room.peer.matches(&notice.from) {
                        self.typing.on_typing(now);
                    }
                }
                None
            }
            TransportEvent::PresenceOnline(p) => {
                self.presence.set(&p.user, true);
                None
            }
            TransportEvent::PresenceUpdate(p) => {
                self.presence.set(&p.user, p.online);
                None
            }
            other @ (TransportEvent::RoomJoin(_) | TransportEvent::ChatSend(_)) => {
                debug!(event = other.name(), "client-bound event ignored");
                None
            }
        }
    }

    /// Waits for the next event from the transport and applies it.
    ///
    /// Malformed frames are logged and skipped (`Ok(None)`); a closed
    /// transport is an error.
    pub async fn next_event(&mut self) -> Result<Option<DisplayMessage>, ChatError> {
        match self.transport.receive().await {
            Ok(event) => Ok(self.handle_event(event)),
            Err(ChatError::SerializationFailed(msg)) => {
                warn!(error = %msg, "malformed transport frame skipped");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Whether the peer counts as typing at `now`.
    pub fn is_peer_typing(&mut self, now: Instant) -> bool {
        self.typing.is_typing(now)
    }

    /// Whether the current peer was last reported online. False if no
    /// presence information has arrived.
    pub fn is_peer_online(&self) -> bool {
        self.room
            .as_ref()
            .and_then(|room| self.presence.is_online(room.peer.as_str()))
            .unwrap_or(false)
    }

    /// The current feed, after every update applied so far.
    pub async fn messages(&self) -> Vec<DisplayMessage> {
        self.feed.snapshot().await
    }

    /// Handle to the feed task.
    pub fn feed(&self) -> &FeedHandle {
        &self.feed
    }

    /// The local identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The current room, if joined.
    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref().map(|room| &room.id)
    }

    /// The current peer, if joined.
    pub fn peer(&self) -> Option<&Username> {
        self.room.as_ref().map(|room| &room.peer)
    }

    /// The peer key cache.
    pub fn peer_cache(&self) -> &PeerCache {
        &self.peers
    }

    /// Closes the transport.
    pub async fn close(&mut self) -> Result<(), ChatError> {
        self.transport.close().await
    }

    /// Snapshot of the session state for debugging.
    pub async fn debug_snapshot(&self) -> SessionSnapshot {
        let room = self.room.as_ref();
        SessionSnapshot {
            username: self.identity.username.as_str().to_string(),
            room: room.map(|r| r.id.as_str().to_string()),
            peer: room.map(|r| r.peer.as_str().to_string()),
            peer_key_known: room.is_some_and(|r| r.peer_key.is_some()),
            peer_online: room.and_then(|r| self.presence.is_online(r.peer.as_str())),
            feed_len: self.feed.snapshot().await.len(),
        }
    }

    /// Looks the peer up in the directory and updates the cache.
    ///
    /// `Ok(None)` means the directory has no entry; the cached entry is
    /// dropped as well.
    async fn refresh_peer_key(&mut self, peer: &Username) -> Result<Option<PublicKey>, ChatError> {
        let key = match self.directory.lookup(peer).await? {
            Some(encoded) => Some(
                decode_public_key(&encoded)
                    .map_err(|_| ChatError::InvalidPeerKey(peer.to_string()))?,
            ),
            None => None,
        };

        let changed = match &key {
            Some(key) => self.peers.upsert(peer.as_str(), key),
            None => self.peers.remove(peer.as_str()),
        };
        if changed {
            if let Err(err) = self.peers.save() {
                warn!(error = %err, "could not save peer cache");
            }
        }
        Ok(key)
    }
}
