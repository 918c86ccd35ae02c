//! # Sealchat Chat Module
//!
//! Two-party encrypted chat over a relay.
//!
//! Every message is sealed twice: once to the recipient's public key and
//! once to the sender's own, so both sides can read it back from history.
//! Rooms are named by the two participants, so both derive the same room
//! id without coordination.
//!
//! ## Security Model
//!
//! - **Sealed boxes** give confidentiality only; the declared sender is not
//!   authenticated
//! - **Directory keys** are untrusted input
//! - **Decryption failures** never abort a batch; the message shows as a
//!   placeholder
//! - **No forward secrecy**: the identity key is long-term

pub mod config;
pub mod directory;
mod error;
pub mod feed;
pub mod history;
pub mod history_store;
pub mod presence;
pub mod protocol;
pub mod room;
mod session;
pub mod transport;

pub use config::ChatConfig;
pub use directory::{Directory, HttpDirectory, MemoryDirectory};
pub use error::ChatError;
pub use feed::{Feed, FeedHandle};
pub use history::{reconcile, reconcile_one, DisplayMessage};
pub use history_store::{HistoryStore, HttpHistoryStore, MemoryHistoryStore};
pub use presence::{PresenceTable, TypingIndicator};
pub use protocol::{
    compose_envelope, decode, encode, try_decode, MessageEnvelope, MessageFormat, TransportEvent,
    UNDECRYPTABLE_PLACEHOLDER,
};
pub use room::{room_id, RoomId, Username};
pub use session::{ChatSession, Identity, SessionSnapshot};
pub use transport::{EventTransport, MemoryTransport, TcpConnection, TcpListener};
