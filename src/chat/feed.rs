//! The message feed of the current room.
//!
//! The feed is owned by a single task. Everything that wants to change it
//! (history replay, live delivery, local echo of sent messages) sends a
//! command through a [`FeedHandle`]; the task applies them one at a time in
//! arrival order.

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::chat::history::DisplayMessage;

/// Commands accepted by the feed task.
#[derive(Debug)]
enum FeedCommand {
    /// Clear the feed (room change).
    Reset,
    /// Install replayed history.
    LoadHistory(Vec<DisplayMessage>),
    /// Append one message.
    Append(DisplayMessage),
    /// Return a copy of the feed.
    Snapshot(oneshot::Sender<Vec<DisplayMessage>>),
}

/// Ordered feed contents.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Feed {
    messages: Vec<DisplayMessage>,
}

impl Feed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the feed.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Appends a message at the end.
    pub fn append(&mut self, message: DisplayMessage) {
        self.messages.push(message);
    }

    /// Replaces the feed with `history`.
    ///
    /// Messages already in the feed that are newer than the last history
    /// record arrived live while history was being fetched; they are kept
    /// after it. Older ones are assumed to be part of the history.
    pub fn load_history(&mut self, history: Vec<DisplayMessage>) {
        let cutoff = history.last().map(|m| m.ts);
        let live: Vec<DisplayMessage> = self
            .messages
            .drain(..)
            .filter(|m| cutoff.is_none_or(|ts| m.ts > ts))
            .collect();

        self.messages = history;
        self.messages.extend(live);
    }

    /// The messages in display order.
    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if the feed is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn apply(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::Reset => self.reset(),
            FeedCommand::LoadHistory(history) => self.load_history(history),
            FeedCommand::Append(message) => self.append(message),
            FeedCommand::Snapshot(reply) => {
                // Requester may have gone away
                let _ = reply.send(self.messages.clone());
            }
        }
    }
}

/// Sending side of the feed task. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    tx: mpsc::UnboundedSender<FeedCommand>,
}

impl FeedHandle {
    /// Spawns the feed task on the current tokio runtime.
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut feed = Feed::new();
            while let Some(command) = rx.recv().await {
                feed.apply(command);
            }
        });
        Self { tx }
    }

    /// Clears the feed.
    pub fn reset(&self) {
        self.send(FeedCommand::Reset);
    }

    /// Installs replayed history.
    pub fn load_history(&self, history: Vec<DisplayMessage>) {
        self.send(FeedCommand::LoadHistory(history));
    }

    /// Appends a message.
    pub fn append(&self, message: DisplayMessage) {
        self.send(FeedCommand::Append(message));
    }

    /// Returns the feed as it stands after every command sent so far.
    pub async fn snapshot(&self) -> Vec<DisplayMessage> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(FeedCommand::Snapshot(reply_tx));
        reply_rx.await.unwrap_or_default()
    }

    fn send(&self, command: FeedCommand) {
        if self.tx.send(command).is_err() {
            warn!("feed task has stopped, command dropped");
        }
    }
}
