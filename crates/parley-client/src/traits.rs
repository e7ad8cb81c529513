//! Transport abstraction for Parley.
//!
//! The session never talks to the network directly. It goes through a
//! [`ChatTransport`], which performs room requests and sends, and receives
//! everything else as [`TransportEvent`]s on a channel handed out when the
//! transport is constructed.

use async_trait::async_trait;
use parley_core::{Avatar, InboundEvent, JoinedRoom, OutboundMessage, RoomId};
use parley_protocol::{Frame, FrameKind};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Could not establish the connection.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The server refused a request.
    #[error("Rejected ({code}): {message}")]
    Rejected {
        /// Error code, see [`parley_protocol::codes`].
        code: u16,
        /// Server-provided reason.
        message: String,
    },

    /// The server answered a request with the wrong kind of frame.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(FrameKind),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] parley_protocol::ProtocolError),
}

/// Something the transport observed, delivered in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established.
    Ready,
    /// The connection is gone. Always the last event.
    Closed,
    /// A frame that is not a response to one of our requests.
    Received(Frame),
}

impl From<TransportEvent> for InboundEvent {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Ready => InboundEvent::ConnectionReady,
            TransportEvent::Closed => InboundEvent::ConnectionClosed,
            TransportEvent::Received(frame) => frame.into(),
        }
    }
}

/// A connection to a chat server.
///
/// Room requests suspend until the server answers. Implementations must not
/// block delivery of [`TransportEvent`]s while a request is outstanding.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Create a room and enter it.
    async fn create_chat_room(&self, nickname: &str, icon: Avatar)
        -> Result<RoomId, TransportError>;

    /// Join an existing room.
    async fn join_chat_room(
        &self,
        nickname: &str,
        room_id: &RoomId,
        icon: Avatar,
    ) -> Result<JoinedRoom, TransportError>;

    /// Send a chat message or typing signal.
    async fn send_message(&self, message: OutboundMessage) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;

    /// Get the transport name (e.g., "websocket", "memory").
    fn name(&self) -> &'static str;

    /// Check if the connection is still open.
    fn is_open(&self) -> bool;
}
