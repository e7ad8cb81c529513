//! Frame types for the Parley protocol.
//!
//! Every frame is a MessagePack map tagged by its `type` field. Frames
//! flowing client → server carry user intent (room requests, chat bodies,
//! typing presence); frames flowing server → client carry identity,
//! broadcasts and responses to room requests.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known error codes carried by [`Frame::Error`].
pub mod codes {
    /// The request was malformed or failed validation.
    pub const INVALID_REQUEST: u16 = 4000;
    /// The requested room does not exist.
    pub const ROOM_NOT_FOUND: u16 = 4004;
    /// The server failed while handling the request.
    pub const INTERNAL: u16 = 5000;
}

/// Frame kind identifiers, mirroring the `type` tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    CreateRoom,
    JoinRoom,
    SendMessage,
    SetTypingPresence,
    Ping,
    UserId,
    RoomCreated,
    RoomJoined,
    Message,
    TypingPresence,
    Error,
    Pong,
    Unknown,
}

impl FrameKind {
    /// The wire tag for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::CreateRoom => "create_room",
            FrameKind::JoinRoom => "join_room",
            FrameKind::SendMessage => "send_message",
            FrameKind::SetTypingPresence => "set_typing_presence",
            FrameKind::Ping => "ping",
            FrameKind::UserId => "user_id",
            FrameKind::RoomCreated => "room_created",
            FrameKind::RoomJoined => "room_joined",
            FrameKind::Message => "message",
            FrameKind::TypingPresence => "typing_presence",
            FrameKind::Error => "error",
            FrameKind::Pong => "pong",
            FrameKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message as broadcast by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message text.
    pub body: String,
    /// Sender nickname, absent for system messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_nickname: Option<String>,
    /// Sender avatar glyph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_icon: Option<String>,
    /// Whether the server generated this message (joins, leaves, ...).
    #[serde(default)]
    pub is_system_message: bool,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl ChatMessage {
    /// A user message with the given body and no sender metadata.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Attach sender metadata.
    #[must_use]
    pub fn from_user(mut self, nickname: impl Into<String>, icon: impl Into<String>) -> Self {
        self.user_nickname = Some(nickname.into());
        self.user_icon = Some(icon.into());
        self
    }

    /// Mark the message as server generated.
    #[must_use]
    pub fn system(mut self) -> Self {
        self.is_system_message = true;
        self
    }

    /// Attach an emission timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Ask the server to create a room and place us in it.
    CreateRoom {
        /// Request ID echoed by the response.
        id: u64,
        nickname: String,
        icon: String,
    },

    /// Ask the server to join an existing room.
    JoinRoom {
        /// Request ID echoed by the response.
        id: u64,
        room_id: String,
        nickname: String,
        icon: String,
    },

    /// Post a chat message to the current room.
    SendMessage { body: String },

    /// Report whether we are currently composing a message.
    SetTypingPresence { typing: bool },

    /// Keepalive ping.
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Identity assignment, sent once after the connection opens.
    UserId { user_id: String },

    /// Response to [`Frame::CreateRoom`].
    RoomCreated { id: u64, room_id: String },

    /// Response to [`Frame::JoinRoom`], optionally replaying room history.
    RoomJoined {
        id: u64,
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        messages: Option<Vec<ChatMessage>>,
    },

    /// A chat message broadcast to the room.
    Message(ChatMessage),

    /// Snapshot of the participants currently typing in the room.
    TypingPresence {
        #[serde(default)]
        users_typing: Vec<String>,
    },

    /// Error response. `id` is 0 when not tied to a request.
    Error { id: u64, code: u16, message: String },

    /// Keepalive pong.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Any frame type this client does not understand.
    #[serde(other)]
    Unknown,
}

impl Frame {
    /// Get the frame kind.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::CreateRoom { .. } => FrameKind::CreateRoom,
            Frame::JoinRoom { .. } => FrameKind::JoinRoom,
            Frame::SendMessage { .. } => FrameKind::SendMessage,
            Frame::SetTypingPresence { .. } => FrameKind::SetTypingPresence,
            Frame::Ping { .. } => FrameKind::Ping,
            Frame::UserId { .. } => FrameKind::UserId,
            Frame::RoomCreated { .. } => FrameKind::RoomCreated,
            Frame::RoomJoined { .. } => FrameKind::RoomJoined,
            Frame::Message(_) => FrameKind::Message,
            Frame::TypingPresence { .. } => FrameKind::TypingPresence,
            Frame::Error { .. } => FrameKind::Error,
            Frame::Pong { .. } => FrameKind::Pong,
            Frame::Unknown => FrameKind::Unknown,
        }
    }

    /// The request ID this frame responds to, for room responses and errors.
    #[must_use]
    pub fn response_id(&self) -> Option<u64> {
        match self {
            Frame::RoomCreated { id, .. } | Frame::RoomJoined { id, .. } => Some(*id),
            Frame::Error { id, .. } if *id != 0 => Some(*id),
            _ => None,
        }
    }

    /// Create a new CreateRoom frame.
    #[must_use]
    pub fn create_room(id: u64, nickname: impl Into<String>, icon: impl Into<String>) -> Self {
        Frame::CreateRoom {
            id,
            nickname: nickname.into(),
            icon: icon.into(),
        }
    }

    /// Create a new JoinRoom frame.
    #[must_use]
    pub fn join_room(
        id: u64,
        room_id: impl Into<String>,
        nickname: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Frame::JoinRoom {
            id,
            room_id: room_id.into(),
            nickname: nickname.into(),
            icon: icon.into(),
        }
    }

    /// Create a new SendMessage frame.
    #[must_use]
    pub fn send_message(body: impl Into<String>) -> Self {
        Frame::SendMessage { body: body.into() }
    }

    /// Create a new SetTypingPresence frame.
    #[must_use]
    pub fn typing(typing: bool) -> Self {
        Frame::SetTypingPresence { typing }
    }

    /// Create a new Error frame.
    #[must_use]
    pub fn error(id: u64, code: u16, message: impl Into<String>) -> Self {
        Frame::Error {
            id,
            code,
            message: message.into(),
        }
    }

    /// Create a new Ping frame.
    #[must_use]
    pub fn ping() -> Self {
        Frame::Ping { timestamp: None }
    }
}
