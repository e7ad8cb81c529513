//! The chat session.
//!
//! [`ChatSession`] owns all client-side state for one connection and is
//! mutated from a single place: the driver feeds it inbound events, user
//! intents and timer expiries, and sends whatever [`OutboundMessage`]s it
//! returns. It performs no I/O itself.

use crate::avatar::Avatar;
use crate::error::SessionError;
use crate::event::InboundEvent;
use crate::gate::ConnectionGate;
use crate::log::MessageLog;
use crate::message::{now_millis, Message, OutboundMessage};
use crate::room::{JoinedRoom, RoomController, RoomId, RoomRequest, RoomState};
use crate::typing::{others_typing, TypingCoordinator, TypingSignal, DEFAULT_TYPING_WINDOW};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet period after the last keystroke before typing stops.
    pub typing_window: Duration,
    /// Append our own messages to the log when sending, instead of waiting
    /// for the transport to echo them back. Enable only for transports that
    /// do not broadcast to the sender, or messages will appear twice.
    pub local_echo: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            typing_window: DEFAULT_TYPING_WINDOW,
            local_echo: false,
        }
    }
}

/// A blocking notice the user must acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The transport closed. Nothing works until restart.
    Disconnected,
    /// A create or join request failed.
    RoomFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Disconnected => f.write_str("Disconnected! Restart to reconnect."),
            Notice::RoomFailed(reason) => write!(f, "Could not enter room: {reason}"),
        }
    }
}

/// The local participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Nickname.
    pub name: String,
    /// Avatar.
    pub icon: Avatar,
    /// Identifier assigned by the transport, once known.
    pub local_id: Option<String>,
}

/// A render-ready snapshot of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    /// Transport is ready.
    pub ready: bool,
    /// Transport closed.
    pub closed: bool,
    /// Who we are, once in a room.
    pub participant: Option<Participant>,
    /// Lobby or room.
    pub room: RoomState,
    /// A create or join is in flight.
    pub room_pending: bool,
    /// Room history in display order.
    pub messages: Vec<Message>,
    /// Someone other than us is typing.
    pub someone_typing: bool,
    /// Outstanding blocking notice.
    pub notice: Option<Notice>,
}

/// Client-side state for one chat connection.
#[derive(Debug)]
pub struct ChatSession {
    config: SessionConfig,
    gate: ConnectionGate,
    rooms: RoomController,
    log: MessageLog,
    typing: TypingCoordinator,
    someone_typing: bool,
    profile: Option<(String, Avatar)>,
    notice: Option<Notice>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl ChatSession {
    /// Create a session waiting for its transport.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let typing = TypingCoordinator::new(config.typing_window);
        Self {
            config,
            gate: ConnectionGate::new(),
            rooms: RoomController::new(),
            log: MessageLog::new(),
            typing,
            someone_typing: false,
            profile: None,
            notice: None,
        }
    }

    /// Apply an inbound transport event.
    pub fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::ConnectionReady => self.gate.connection_ready(),
            InboundEvent::ConnectionClosed => self.connection_closed(),
            InboundEvent::IdentityAssigned { user_id } => {
                if let Some(previous) = self.gate.assign_identity(user_id) {
                    warn!(previous = %previous, "Identity reassigned");
                }
            }
            InboundEvent::ChatMessage(message) => {
                trace!(from = %message.display_name(), "Message received");
                self.log.append(message);
            }
            InboundEvent::TypingRoster { users_typing } => {
                self.someone_typing = others_typing(&users_typing, self.gate.local_id());
            }
            InboundEvent::Ignored(kind) => {
                debug!(%kind, "Ignoring inbound frame");
            }
        }
    }

    fn connection_closed(&mut self) {
        self.gate.connection_closed();
        self.typing.cancel();
        self.someone_typing = false;
        if let Some(request) = self.rooms.fail() {
            debug!(?request, "Room request abandoned by close");
        }
        self.notice = Some(Notice::Disconnected);
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.gate.is_closed() {
            return Err(SessionError::Disconnected);
        }
        if !self.gate.is_ready() {
            return Err(SessionError::NotReady);
        }
        Ok(())
    }

    /// Start creating a room. The caller forwards the request to the
    /// transport and reports back with [`room_created`](Self::room_created)
    /// or [`room_failed`](Self::room_failed).
    ///
    /// # Errors
    ///
    /// Fails without changing state if a precondition is not met.
    pub fn begin_create(
        &mut self,
        nickname: &str,
        avatar: Avatar,
    ) -> Result<RoomRequest, SessionError> {
        self.ensure_connected()?;
        let request = RoomRequest::create(nickname, avatar)?;
        self.rooms.begin(request.clone())?;
        Ok(request)
    }

    /// Start joining a room. The caller reports back with
    /// [`room_joined`](Self::room_joined) or [`room_failed`](Self::room_failed).
    ///
    /// # Errors
    ///
    /// Fails without changing state if a precondition is not met.
    pub fn begin_join(
        &mut self,
        nickname: &str,
        avatar: Avatar,
        room_id: &str,
    ) -> Result<RoomRequest, SessionError> {
        self.ensure_connected()?;
        let request = RoomRequest::join(nickname, avatar, room_id)?;
        self.rooms.begin(request.clone())?;
        Ok(request)
    }

    /// The transport created our room.
    ///
    /// # Errors
    ///
    /// Fails if no create was pending; the session stays in the lobby.
    pub fn room_created(&mut self, room_id: RoomId) -> Result<(), SessionError> {
        let request = self
            .rooms
            .complete_create(room_id)
            .map_err(|e| self.reject(e))?;
        self.enter(request);
        Ok(())
    }

    /// The transport joined our room, possibly replaying its history.
    ///
    /// Replayed history replaces the log wholesale.
    ///
    /// # Errors
    ///
    /// Fails if no join was pending or a different room was joined; the
    /// session stays in the lobby.
    pub fn room_joined(&mut self, joined: JoinedRoom) -> Result<(), SessionError> {
        let request = self
            .rooms
            .complete_join(joined.room_id)
            .map_err(|e| self.reject(e))?;
        if let Some(history) = joined.messages {
            self.log.seed(history);
        }
        self.enter(request);
        Ok(())
    }

    /// The outstanding create or join failed.
    pub fn room_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.rooms.fail().is_none() {
            debug!(reason = %reason, "Room failure with nothing pending");
            return;
        }
        warn!(reason = %reason, "Room request failed");
        self.raise(Notice::RoomFailed(reason));
    }

    fn reject(&mut self, error: SessionError) -> SessionError {
        warn!(error = %error, "Room response rejected");
        self.raise(Notice::RoomFailed(error.to_string()));
        error
    }

    /// Replace the outstanding notice. A disconnect notice is never replaced.
    fn raise(&mut self, notice: Notice) {
        if self.notice != Some(Notice::Disconnected) {
            self.notice = Some(notice);
        }
    }

    fn enter(&mut self, request: RoomRequest) {
        let avatar = request.avatar();
        let nickname = match request {
            RoomRequest::Create { nickname, .. } | RoomRequest::Join { nickname, .. } => nickname,
        };
        info!(nickname = %nickname, %avatar, messages = self.log.len(), "Entered room");
        self.profile = Some((nickname, avatar));
    }

    /// The input field changed to `text`.
    ///
    /// Returns a typing signal to send, if the state machine produced one.
    /// Ignored outside a room or after the transport closed.
    pub fn keystroke(&mut self, text: &str, now: Instant) -> Option<OutboundMessage> {
        if self.gate.is_closed() || self.rooms.room_id().is_none() {
            return None;
        }
        self.typing.keystroke(text, now).map(typing_message)
    }

    /// When the typing timer next needs [`typing_expired`](Self::typing_expired).
    #[must_use]
    pub fn typing_deadline(&self) -> Option<Instant> {
        self.typing.deadline()
    }

    /// Fire the typing timer if due.
    pub fn typing_expired(&mut self, now: Instant) -> Option<OutboundMessage> {
        self.typing.expire(now).map(typing_message)
    }

    /// Send a chat message.
    ///
    /// Returns the chat message followed by a typing=false signal, which is
    /// produced on every send whether or not we were signaling.
    ///
    /// # Errors
    ///
    /// Fails without changing state if disconnected, outside a room, or the
    /// body is empty.
    pub fn send(&mut self, body: &str) -> Result<Vec<OutboundMessage>, SessionError> {
        self.ensure_connected()?;
        if self.rooms.room_id().is_none() {
            return Err(SessionError::NotInRoom);
        }
        if body.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let stopped = self.typing.message_sent();
        Ok(vec![
            OutboundMessage::Chat {
                body: body.to_string(),
            },
            typing_message(stopped),
        ])
    }

    /// Record that a chat message reached the transport.
    ///
    /// With local echo enabled the message is appended to the log under our
    /// own profile. Otherwise the server's broadcast is what shows it.
    pub fn message_delivered(&mut self, body: &str) {
        if !self.config.local_echo || self.gate.is_closed() {
            return;
        }
        if let Some((name, avatar)) = &self.profile {
            let mut echo = Message::user(body, name.as_str(), avatar.glyph());
            if let Some(now) = now_millis() {
                echo = echo.at(now);
            }
            self.log.append(echo);
        }
    }

    /// The outstanding notice, if any.
    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Acknowledge the outstanding notice.
    ///
    /// [`Notice::Disconnected`] cannot be dismissed.
    pub fn dismiss_notice(&mut self) -> Option<Notice> {
        match self.notice {
            Some(Notice::Disconnected) => None,
            _ => self.notice.take(),
        }
    }

    /// Connection state.
    #[must_use]
    pub fn gate(&self) -> &ConnectionGate {
        &self.gate
    }

    /// Room state.
    #[must_use]
    pub fn room(&self) -> &RoomState {
        self.rooms.state()
    }

    /// Check if a create or join is in flight.
    #[must_use]
    pub fn room_pending(&self) -> bool {
        self.rooms.pending().is_some()
    }

    /// The message log.
    #[must_use]
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Local typing state.
    #[must_use]
    pub fn typing(&self) -> &TypingCoordinator {
        &self.typing
    }

    /// Someone other than us is typing, per the latest roster.
    #[must_use]
    pub fn someone_typing(&self) -> bool {
        self.someone_typing
    }

    /// The local participant, once in a room.
    #[must_use]
    pub fn participant(&self) -> Option<Participant> {
        self.profile.as_ref().map(|(name, icon)| Participant {
            name: name.clone(),
            icon: *icon,
            local_id: self.gate.local_id().map(str::to_string),
        })
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot the session for rendering.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            ready: self.gate.is_ready(),
            closed: self.gate.is_closed(),
            participant: self.participant(),
            room: self.rooms.state().clone(),
            room_pending: self.room_pending(),
            messages: self.log.as_slice().to_vec(),
            someone_typing: self.someone_typing,
            notice: self.notice.clone(),
        }
    }
}

fn typing_message(signal: TypingSignal) -> OutboundMessage {
    OutboundMessage::Typing {
        typing: signal.is_typing(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_session() -> ChatSession {
        let mut session = ChatSession::default();
        session.handle_event(InboundEvent::ConnectionReady);
        session.handle_event(InboundEvent::IdentityAssigned {
            user_id: "me".into(),
        });
        session
    }

    fn in_room() -> ChatSession {
        let mut session = ready_session();
        session.begin_create("Ann", Avatar::Cat).unwrap();
        session.room_created(RoomId::new("r-1")).unwrap();
        session
    }

    fn typing(flag: bool) -> OutboundMessage {
        OutboundMessage::Typing { typing: flag }
    }

    #[test]
    fn test_create_room() {
        let mut session = ready_session();
        let request = session.begin_create("Ann", Avatar::Cat).unwrap();
        assert_eq!(request.nickname(), "Ann");
        assert!(session.room_pending());

        session.room_created(RoomId::new("r-1")).unwrap();

        assert_eq!(
            session.room(),
            &RoomState::InRoom {
                room_id: RoomId::new("r-1")
            }
        );
        assert!(session.log().is_empty());
        let me = session.participant().unwrap();
        assert_eq!(me.name, "Ann");
        assert_eq!(me.icon.glyph(), "🐱");
        assert_eq!(me.local_id.as_deref(), Some("me"));
    }

    #[test]
    fn test_join_replaces_log_with_history() {
        let mut session = ready_session();
        session.handle_event(InboundEvent::ChatMessage(Message::system("early")));

        session.begin_join("Bob", Avatar::Fox, "XYZ").unwrap();
        session
            .room_joined(JoinedRoom {
                room_id: RoomId::new("XYZ"),
                messages: Some(vec![Message::user("hi", "Ann", "🐱")]),
            })
            .unwrap();

        let bodies: Vec<_> = session.log().iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["hi"]);

        // Growth only from here on
        session.handle_event(InboundEvent::ChatMessage(Message::user("yo", "Bob", "🦊")));
        assert_eq!(session.log().len(), 2);
    }

    #[test]
    fn test_join_without_history_keeps_log() {
        let mut session = ready_session();
        session.begin_join("Bob", Avatar::Fox, "XYZ").unwrap();
        session
            .room_joined(JoinedRoom {
                room_id: RoomId::new("XYZ"),
                messages: None,
            })
            .unwrap();
        assert!(session.log().is_empty());
        assert!(session.room().room_id().is_some());
    }

    #[test]
    fn test_preconditions() {
        let mut session = ChatSession::default();
        assert_eq!(
            session.begin_create("Ann", Avatar::Cat),
            Err(SessionError::NotReady)
        );

        session.handle_event(InboundEvent::ConnectionReady);
        assert_eq!(
            session.begin_create("", Avatar::Cat),
            Err(SessionError::EmptyNickname)
        );
        assert!(!session.room_pending());
        assert_eq!(session.send("hi"), Err(SessionError::NotInRoom));

        session.begin_create("Ann", Avatar::Cat).unwrap();
        assert_eq!(
            session.begin_join("Ann", Avatar::Cat, "XYZ"),
            Err(SessionError::RoomOperationPending)
        );
    }

    #[test]
    fn test_room_failure_raises_notice() {
        let mut session = ready_session();
        session.begin_join("Bob", Avatar::Fox, "nope").unwrap();
        session.room_failed("room not found");

        assert_eq!(session.room(), &RoomState::NoRoom);
        assert!(!session.room_pending());
        assert_eq!(
            session.notice(),
            Some(&Notice::RoomFailed("room not found".into()))
        );
        assert!(session.dismiss_notice().is_some());
        assert!(session.notice().is_none());

        // Can try again
        assert!(session.begin_join("Bob", Avatar::Fox, "XYZ").is_ok());
    }

    #[test]
    fn test_unexpected_room_response() {
        let mut session = ready_session();
        session.begin_join("Bob", Avatar::Fox, "XYZ").unwrap();

        let result = session.room_joined(JoinedRoom {
            room_id: RoomId::new("ABC"),
            messages: Some(vec![Message::system("not ours")]),
        });

        assert!(matches!(result, Err(SessionError::UnexpectedResponse(_))));
        assert_eq!(session.room(), &RoomState::NoRoom);
        assert!(session.log().is_empty());
        assert!(matches!(session.notice(), Some(Notice::RoomFailed(_))));
    }

    #[test]
    fn test_typing_indicator_excludes_self() {
        let mut session = in_room();

        session.handle_event(InboundEvent::TypingRoster {
            users_typing: vec!["me".into()],
        });
        assert!(!session.someone_typing());

        session.handle_event(InboundEvent::TypingRoster {
            users_typing: vec!["me".into(), "other1".into()],
        });
        assert!(session.someone_typing());

        // Each snapshot replaces the last
        session.handle_event(InboundEvent::TypingRoster {
            users_typing: Vec::new(),
        });
        assert!(!session.someone_typing());
    }

    #[test]
    fn test_keystrokes_and_expiry() {
        let mut session = in_room();
        let t0 = Instant::now();

        assert_eq!(session.keystroke("h", t0), Some(typing(true)));
        assert_eq!(
            session.keystroke("he", t0 + Duration::from_millis(500)),
            None
        );
        assert_eq!(
            session.keystroke("hel", t0 + Duration::from_millis(1000)),
            None
        );

        let deadline = session.typing_deadline().unwrap();
        assert_eq!(session.typing_expired(deadline), Some(typing(false)));
        assert_eq!(session.typing_deadline(), None);
    }

    #[test]
    fn test_keystroke_outside_room_ignored() {
        let mut session = ready_session();
        assert_eq!(session.keystroke("h", Instant::now()), None);
        assert_eq!(session.typing_deadline(), None);
    }

    #[test]
    fn test_send_always_stops_typing() {
        let mut session = in_room();

        let sent = session.send("hello").unwrap();
        assert_eq!(
            sent,
            vec![
                OutboundMessage::Chat {
                    body: "hello".into()
                },
                typing(false)
            ]
        );

        // No local echo by default
        assert!(session.log().is_empty());

        session.keystroke("x", Instant::now());
        let sent = session.send("x").unwrap();
        assert_eq!(sent.last(), Some(&typing(false)));
        assert_eq!(session.typing_deadline(), None);

        assert_eq!(session.send(""), Err(SessionError::EmptyMessage));
    }

    #[test]
    fn test_local_echo() {
        let mut session = ChatSession::new(SessionConfig {
            local_echo: true,
            ..SessionConfig::default()
        });
        session.handle_event(InboundEvent::ConnectionReady);
        session.begin_create("Ann", Avatar::Cat).unwrap();
        session.room_created(RoomId::new("r-1")).unwrap();

        session.send("hello").unwrap();
        assert!(session.log().is_empty());

        session.message_delivered("hello");
        let echoed = session.log().last().unwrap();
        assert_eq!(echoed.body, "hello");
        assert_eq!(echoed.display_name(), "Ann");
        assert_eq!(echoed.display_icon(), "🐱");
    }

    #[test]
    fn test_delivery_without_local_echo() {
        let mut session = in_room();
        session.send("hello").unwrap();
        session.message_delivered("hello");
        assert!(session.log().is_empty());
    }

    #[test]
    fn test_disconnect_is_fatal() {
        let mut session = in_room();
        session.keystroke("h", Instant::now());

        session.handle_event(InboundEvent::ConnectionClosed);

        assert_eq!(session.notice(), Some(&Notice::Disconnected));
        assert_eq!(session.dismiss_notice(), None);
        assert_eq!(session.typing_deadline(), None);
        assert_eq!(session.send("hi"), Err(SessionError::Disconnected));
        assert_eq!(session.keystroke("hi", Instant::now()), None);

        // A late room response does not hide the disconnect
        assert!(session.room_created(RoomId::new("late")).is_err());
        assert_eq!(session.notice(), Some(&Notice::Disconnected));

        let view = session.view();
        assert!(view.closed);
        assert!(!view.ready);
    }

    #[test]
    fn test_ignored_event_changes_nothing() {
        let mut session = in_room();
        let before = session.view();
        session.handle_event(InboundEvent::Ignored(parley_protocol::FrameKind::Unknown));
        assert_eq!(session.view(), before);
    }
}
