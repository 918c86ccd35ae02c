//! TCP transport for relay connections.
//!
//! Each event is one JSON document in a length-prefixed frame. Incoming
//! bytes are buffered until a whole frame is available, so a cancelled
//! `receive` never loses part of a frame.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::chat::error::ChatError;
use crate::chat::protocol::TransportEvent;
use crate::chat::transport::{take_frame, write_length_prefixed, EventTransport};

/// TCP connection wrapper using tokio.
pub struct TcpConnection {
    reader: ReadHalf<TcpStream>,
    writer: BufWriter<WriteHalf<TcpStream>>,
    pending: Vec<u8>,
    peer_addr: String,
}

impl TcpConnection {
    /// Create a new TCP connection from a stream.
    pub fn new(stream: TcpStream) -> Self {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let (read_half, write_half) = tokio::io::split(stream);

        Self {
            reader: read_half,
            writer: BufWriter::new(write_half),
            pending: Vec::new(),
            peer_addr,
        }
    }

    /// Connect to a relay.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ChatError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ChatError::TransportError(format!("Failed to connect: {}", e)))?;
        let conn = Self::new(stream);
        debug!(peer = %conn.peer_addr, "connected to relay");
        Ok(conn)
    }
}

#[async_trait]
impl EventTransport for TcpConnection {
    async fn send(&mut self, event: &TransportEvent) -> Result<(), ChatError> {
        let data = event
            .to_bytes()
            .map_err(|e| ChatError::SerializationFailed(e.to_string()))?;
        write_length_prefixed(&mut self.writer, &data).await
    }

    async fn receive(&mut self) -> Result<TransportEvent, ChatError> {
        loop {
            if let Some(frame) = take_frame(&mut self.pending)? {
                return TransportEvent::from_bytes(&frame)
                    .map_err(|e| ChatError::SerializationFailed(e.to_string()));
            }

            let n = self.reader.read_buf(&mut self.pending).await?;
            if n == 0 {
                return Err(ChatError::TransportError("Connection closed by relay".to_string()));
            }
        }
    }

    async fn close(&mut self) -> Result<(), ChatError> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    fn peer_addr(&self) -> Result<String, ChatError> {
        Ok(self.peer_addr.clone())
    }
}

/// TCP listener accepting transport connections.
pub struct TcpListener {
    listener: TokioTcpListener,
}

impl TcpListener {
    /// Bind to an address and start listening.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, ChatError> {
        let listener = TokioTcpListener::bind(addr)
            .await
            .map_err(|e| ChatError::TransportError(format!("Failed to bind: {}", e)))?;
        Ok(Self { listener })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<TcpConnection, ChatError> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| ChatError::TransportError(format!("Failed to accept: {}", e)))?;
        Ok(TcpConnection::new(stream))
    }

    /// Get the local address.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ChatError> {
        self.listener
            .local_addr()
            .map_err(|e| ChatError::TransportError(format!("Failed to get local addr: {}", e)))
    }
}
