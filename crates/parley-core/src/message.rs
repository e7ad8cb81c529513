//! Chat message types.
//!
//! [`Message`] is what the log stores and the UI renders. [`OutboundMessage`]
//! is what the session asks the transport to send.

use parley_protocol::{ChatMessage, Frame};
use std::time::{SystemTime, UNIX_EPOCH};

/// Name shown for messages without a sender.
pub const SYSTEM_SENDER: &str = "System";

/// Icon shown for messages without a sender icon.
pub const FALLBACK_ICON: &str = "👤";

/// Whether a message was written by a participant or generated by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    User,
    System,
}

/// A displayed chat event. Immutable once appended to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// User or system message.
    pub kind: MessageKind,
    /// Message text.
    pub body: String,
    /// Sender nickname.
    pub sender_name: Option<String>,
    /// Sender avatar glyph.
    pub sender_icon: Option<String>,
    /// Milliseconds since the Unix epoch, when known.
    pub emitted_at: Option<u64>,
}

impl Message {
    /// Create a user message.
    #[must_use]
    pub fn user(
        body: impl Into<String>,
        sender_name: impl Into<String>,
        sender_icon: impl Into<String>,
    ) -> Self {
        Self {
            kind: MessageKind::User,
            body: body.into(),
            sender_name: Some(sender_name.into()),
            sender_icon: Some(sender_icon.into()),
            emitted_at: None,
        }
    }

    /// Create a system message.
    #[must_use]
    pub fn system(body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::System,
            body: body.into(),
            sender_name: None,
            sender_icon: None,
            emitted_at: None,
        }
    }

    /// Set the emission timestamp.
    #[must_use]
    pub fn at(mut self, emitted_at: u64) -> Self {
        self.emitted_at = Some(emitted_at);
        self
    }

    /// Check if this is a system message.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }

    /// Name to render next to the body.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.sender_name.as_deref().unwrap_or(SYSTEM_SENDER)
    }

    /// Icon to render next to the name.
    #[must_use]
    pub fn display_icon(&self) -> &str {
        self.sender_icon.as_deref().unwrap_or(FALLBACK_ICON)
    }
}

impl From<ChatMessage> for Message {
    fn from(msg: ChatMessage) -> Self {
        Self {
            kind: if msg.is_system_message {
                MessageKind::System
            } else {
                MessageKind::User
            },
            body: msg.body,
            sender_name: msg.user_nickname,
            sender_icon: msg.user_icon,
            emitted_at: msg.timestamp,
        }
    }
}

/// The categories of message the transport can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendKind {
    ChatMessage,
    TypingPresence,
}

impl SendKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SendKind::ChatMessage => "chat_message",
            SendKind::TypingPresence => "typing_presence",
        }
    }
}

/// A message the session wants sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// A chat body for the current room.
    Chat { body: String },
    /// Local typing presence.
    Typing { typing: bool },
}

impl OutboundMessage {
    /// The category this message is sent under.
    #[must_use]
    pub fn kind(&self) -> SendKind {
        match self {
            OutboundMessage::Chat { .. } => SendKind::ChatMessage,
            OutboundMessage::Typing { .. } => SendKind::TypingPresence,
        }
    }
}

impl From<OutboundMessage> for Frame {
    fn from(msg: OutboundMessage) -> Self {
        match msg {
            OutboundMessage::Chat { body } => Frame::send_message(body),
            OutboundMessage::Typing { typing } => Frame::typing(typing),
        }
    }
}

/// Current wall-clock time in milliseconds, if the clock is sane.
#[must_use]
pub fn now_millis() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire_message() {
        let msg: Message = ChatMessage::new("hi").from_user("Ann", "🐱").at(5).into();
        assert_eq!(msg.kind, MessageKind::User);
        assert_eq!(msg.display_name(), "Ann");
        assert_eq!(msg.display_icon(), "🐱");
        assert_eq!(msg.emitted_at, Some(5));

        let sys: Message = ChatMessage::new("Bob joined").system().into();
        assert!(sys.is_system());
    }

    #[test]
    fn test_display_fallbacks() {
        let msg = Message::system("Room created");
        assert_eq!(msg.display_name(), "System");
        assert_eq!(msg.display_icon(), "👤");
    }

    #[test]
    fn test_outbound_to_frame() {
        let chat = OutboundMessage::Chat { body: "hi".into() };
        assert_eq!(chat.kind(), SendKind::ChatMessage);
        assert_eq!(Frame::from(chat), Frame::send_message("hi"));

        let typing = OutboundMessage::Typing { typing: false };
        assert_eq!(typing.kind().as_str(), "typing_presence");
        assert_eq!(Frame::from(typing), Frame::typing(false));
    }
}
