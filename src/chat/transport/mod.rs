//! Transport layer for relay connections.
//!
//! This module defines the async transport trait and implementations:
//! a TCP transport carrying length-prefixed JSON events, and an in-memory
//! pair for tests and embedding.

mod memory;
mod tcp;

pub use memory::MemoryTransport;
pub use tcp::{TcpConnection, TcpListener};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::chat::error::ChatError;
use crate::chat::protocol::TransportEvent;

/// Largest frame accepted from the wire.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Trait for bidirectional async event transport.
#[async_trait]
pub trait EventTransport: Send {
    /// Send an event.
    async fn send(&mut self, event: &TransportEvent) -> Result<(), ChatError>;

    /// Receive the next event.
    ///
    /// Must be cancel safe: dropping the future before it completes loses
    /// no data.
    async fn receive(&mut self) -> Result<TransportEvent, ChatError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), ChatError>;

    /// Get the peer address as a string.
    fn peer_addr(&self) -> Result<String, ChatError>;
}

/// Helper to write a length-prefixed frame asynchronously.
pub async fn write_length_prefixed<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ChatError> {
    if data.len() > MAX_FRAME_LEN {
        return Err(ChatError::TransportError(format!(
            "Frame too large: {} bytes",
            data.len()
        )));
    }

    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Splits the first complete length-prefixed frame off the front of `buf`.
///
/// Returns `Ok(None)` until a whole frame has been buffered.
pub fn take_frame(buf: &mut Vec<u8>) -> Result<Option<Vec<u8>>, ChatError> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ChatError::TransportError(format!(
            "Frame too large: {} bytes",
            len
        )));
    }
    if buf.len() < 4 + len {
        return Ok(None);
    }

    let frame = buf[4..4 + len].to_vec();
    buf.drain(..4 + len);
    Ok(Some(frame))
}
