//! WebSocket transport implementation.
//!
//! This module provides a WebSocket-based client transport using
//! tokio-tungstenite. The socket is split into a writer task fed by a
//! channel and a reader task that decodes frames, resolves outstanding room
//! requests and forwards everything else as [`TransportEvent`]s.

use async_trait::async_trait;
use bytes::BytesMut;
use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parley_core::{Avatar, JoinedRoom, Message as ChatMessage, OutboundMessage, RoomId};
use parley_protocol::{codec, Frame, ProtocolError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::traits::{ChatTransport, TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Server URL, e.g. `ws://127.0.0.1:8080/ws`.
    pub url: String,
    /// Maximum message size in bytes.
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            max_message_size: codec::MAX_FRAME_SIZE + codec::LENGTH_PREFIX_SIZE,
        }
    }
}

impl WebSocketConfig {
    /// Create a config for the given server URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

enum Outgoing {
    Frame(Frame),
    Close,
}

type PendingRequests = DashMap<u64, oneshot::Sender<Frame>>;

/// A WebSocket connection to a chat server.
pub struct WebSocketTransport {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    pending: Arc<PendingRequests>,
    next_request_id: AtomicU64,
    is_open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Connect to a server.
    ///
    /// Returns the transport and the receiver for its events. The first
    /// event is always [`TransportEvent::Ready`].
    ///
    /// # Errors
    ///
    /// Returns an error if the WebSocket handshake fails.
    pub async fn connect(
        config: WebSocketConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), TransportError> {
        let (ws_stream, _response) = connect_async(config.url.as_str()).await.map_err(|e| {
            error!("WebSocket handshake failed: {}", e);
            TransportError::Connect(e.to_string())
        })?;

        info!("Connected to {}", config.url);

        let (sink, stream) = ws_stream.split();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingRequests::new());
        let is_open = Arc::new(AtomicBool::new(true));

        let _ = events_tx.send(TransportEvent::Ready);

        tokio::spawn(write_loop(sink, outgoing_rx));
        let reader = tokio::spawn(read_loop(
            stream,
            Arc::clone(&pending),
            Arc::clone(&is_open),
            events_tx,
            config.max_message_size,
        ));

        let transport = Self {
            outgoing: outgoing_tx,
            pending,
            next_request_id: AtomicU64::new(1),
            is_open,
            reader,
        };
        Ok((transport, events_rx))
    }

    /// Send a request frame and wait for the frame answering it.
    async fn request(&self, build: impl FnOnce(u64) -> Frame) -> Result<Frame, TransportError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let rx = register(&self.pending, &self.is_open, id)?;

        if self.outgoing.send(Outgoing::Frame(build(id))).is_err() {
            self.pending.remove(&id);
            return Err(TransportError::ConnectionClosed);
        }

        // The reader drops every sender when the connection ends
        rx.await.map_err(|_| TransportError::ConnectionClosed)
    }
}

/// Park a reply slot for request `id`.
///
/// The slot is inserted before the open check. The reader marks the
/// connection closed before clearing `pending`, so a slot is either cleared
/// by the reader or removed here, never left waiting.
fn register(
    pending: &PendingRequests,
    is_open: &AtomicBool,
    id: u64,
) -> Result<oneshot::Receiver<Frame>, TransportError> {
    let (tx, rx) = oneshot::channel();
    pending.insert(id, tx);
    if !is_open.load(Ordering::SeqCst) {
        pending.remove(&id);
        return Err(TransportError::ConnectionClosed);
    }
    Ok(rx)
}

#[async_trait]
impl ChatTransport for WebSocketTransport {
    async fn create_chat_room(
        &self,
        nickname: &str,
        icon: Avatar,
    ) -> Result<RoomId, TransportError> {
        match self
            .request(|id| Frame::create_room(id, nickname, icon.glyph()))
            .await?
        {
            Frame::RoomCreated { room_id, .. } => Ok(RoomId::new(room_id)),
            Frame::Error { code, message, .. } => Err(TransportError::Rejected { code, message }),
            other => Err(TransportError::UnexpectedResponse(other.kind())),
        }
    }

    async fn join_chat_room(
        &self,
        nickname: &str,
        room_id: &RoomId,
        icon: Avatar,
    ) -> Result<JoinedRoom, TransportError> {
        match self
            .request(|id| Frame::join_room(id, room_id.as_str(), nickname, icon.glyph()))
            .await?
        {
            Frame::RoomJoined {
                room_id, messages, ..
            } => Ok(JoinedRoom {
                room_id: RoomId::new(room_id),
                messages: messages
                    .map(|history| history.into_iter().map(ChatMessage::from).collect()),
            }),
            Frame::Error { code, message, .. } => Err(TransportError::Rejected { code, message }),
            other => Err(TransportError::UnexpectedResponse(other.kind())),
        }
    }

    async fn send_message(&self, message: OutboundMessage) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        self.outgoing
            .send(Outgoing::Frame(message.into()))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return Ok(()); // Already closed
        }
        self.outgoing
            .send(Outgoing::Close)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn name(&self) -> &'static str {
        "websocket"
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    while let Some(item) = outgoing.recv().await {
        match item {
            Outgoing::Frame(frame) => {
                let kind = frame.kind();
                let data = match codec::encode(&frame) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(%kind, "Failed to encode frame: {}", e);
                        metrics::record_error("encode");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Binary(data.to_vec())).await {
                    warn!(%kind, "Failed to send frame: {}", e);
                    metrics::record_error("send");
                    break;
                }
            }
            Outgoing::Close => break,
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Close after write loop failed: {}", e);
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    pending: Arc<PendingRequests>,
    is_open: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<TransportEvent>,
    max_message_size: usize,
) {
    let mut buffer = BytesMut::with_capacity(4096);

    loop {
        let data = match stream.next().await {
            Some(Ok(Message::Binary(data))) => data,
            // For compatibility, treat text as binary
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(_))) => {
                debug!("Received close frame");
                break;
            }
            Some(Err(WsError::ConnectionClosed)) | None => {
                debug!("WebSocket stream ended");
                break;
            }
            Some(Err(e)) => {
                error!("WebSocket error: {}", e);
                metrics::record_error("receive");
                break;
            }
        };

        if data.len() > max_message_size {
            warn!(
                "Message too large: {} bytes (max: {})",
                data.len(),
                max_message_size
            );
            metrics::record_error("oversized");
            break;
        }

        buffer.extend_from_slice(&data);
        if let Err(e) = drain(&mut buffer, &pending, &events) {
            error!("Unrecoverable framing error: {}", e);
            metrics::record_error("decode");
            break;
        }
    }

    is_open.store(false, Ordering::SeqCst);
    pending.clear();
    let _ = events.send(TransportEvent::Closed);
    info!("Connection closed");
}

/// Decode and route every whole frame in `buffer`.
///
/// Undecodable payloads are skipped. Only a corrupt length prefix is fatal.
fn drain(
    buffer: &mut BytesMut,
    pending: &PendingRequests,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Result<(), ProtocolError> {
    loop {
        match codec::decode_from(buffer) {
            Ok(Some(frame)) => route(frame, pending, events),
            Ok(None) => return Ok(()),
            Err(e @ ProtocolError::Decode(_)) => {
                warn!("Dropping undecodable frame: {}", e);
                metrics::record_error("decode");
            }
            Err(e) => return Err(e),
        }
    }
}

fn route(frame: Frame, pending: &PendingRequests, events: &mpsc::UnboundedSender<TransportEvent>) {
    if let Some(id) = frame.response_id() {
        if let Some((_, reply)) = pending.remove(&id) {
            let _ = reply.send(frame);
        } else {
            warn!(id, kind = %frame.kind(), "Response for unknown request");
        }
        return;
    }

    if let Frame::Error { code, message, .. } = &frame {
        warn!(code, "Server error: {}", message);
    }
    let _ = events.send(TransportEvent::Received(frame));
}
