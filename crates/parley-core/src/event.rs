//! Inbound event classification.
//!
//! Everything the transport delivers is folded into [`InboundEvent`], a
//! closed set the session matches on exhaustively.

use crate::message::Message;
use parley_protocol::{Frame, FrameKind};

/// An event delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// The transport is connected and accepting requests.
    ConnectionReady,
    /// The transport closed.
    ConnectionClosed,
    /// The transport assigned our participant identifier.
    IdentityAssigned { user_id: String },
    /// A chat message arrived for the room.
    ChatMessage(Message),
    /// Latest snapshot of who is typing.
    TypingRoster { users_typing: Vec<String> },
    /// A frame kind the session does not act on.
    Ignored(FrameKind),
}

impl From<Frame> for InboundEvent {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::UserId { user_id } => InboundEvent::IdentityAssigned { user_id },
            Frame::Message(msg) => InboundEvent::ChatMessage(msg.into()),
            Frame::TypingPresence { users_typing } => InboundEvent::TypingRoster { users_typing },
            other => InboundEvent::Ignored(other.kind()),
        }
    }
}
