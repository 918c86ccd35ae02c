//! In-process transport: two connected ends backed by channels.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::chat::error::ChatError;
use crate::chat::protocol::TransportEvent;
use crate::chat::transport::EventTransport;

/// One end of an in-memory transport pair.
pub struct MemoryTransport {
    tx: Option<mpsc::UnboundedSender<TransportEvent>>,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
    label: String,
}

impl MemoryTransport {
    /// Creates two connected ends. What one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(a_tx),
                rx: a_rx,
                label: "memory:a".to_string(),
            },
            Self {
                tx: Some(b_tx),
                rx: b_rx,
                label: "memory:b".to_string(),
            },
        )
    }

    /// Returns the next event if one is already queued.
    pub fn try_receive(&mut self) -> Option<TransportEvent> {
        self.rx.try_recv().ok()
    }
}

#[async_trait]
impl EventTransport for MemoryTransport {
    async fn send(&mut self, event: &TransportEvent) -> Result<(), ChatError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ChatError::TransportError("transport closed".to_string()))?;
        tx.send(event.clone())
            .map_err(|_| ChatError::TransportError("peer disconnected".to_string()))
    }

    async fn receive(&mut self) -> Result<TransportEvent, ChatError> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| ChatError::TransportError("peer disconnected".to_string()))
    }

    async fn close(&mut self) -> Result<(), ChatError> {
        self.tx = None;
        Ok(())
    }

    fn peer_addr(&self) -> Result<String, ChatError> {
        Ok(self.label.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_both_ways() {
        let (mut a, mut b) = MemoryTransport::pair();

        a.send(&TransportEvent::RoomJoin("x|y".to_string())).await.unwrap();
        assert_eq!(b.receive().await.unwrap().name(), "room:join");

        b.send(&TransportEvent::RoomJoin("y|z".to_string())).await.unwrap();
        assert_eq!(a.receive().await.unwrap(), TransportEvent::RoomJoin("y|z".to_string()));
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (mut a, mut b) = MemoryTransport::pair();

        a.close().await.unwrap();
        assert!(a.send(&TransportEvent::RoomJoin("x|y".to_string())).await.is_err());
        assert!(matches!(b.receive().await, Err(ChatError::TransportError(_))));
    }
}
