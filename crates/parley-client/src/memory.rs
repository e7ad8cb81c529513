//! In-process transport.
//!
//! [`MemoryTransport`] stands in for a chat server inside one process. The
//! paired [`MemoryRemote`] plays the server: it opens and closes the
//! connection, pushes broadcasts, and records what the client sent.

use async_trait::async_trait;
use parley_core::{Avatar, JoinedRoom, Message, OutboundMessage, RoomId};
use parley_protocol::{codes, ChatMessage, Frame};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::traits::{ChatTransport, TransportError, TransportEvent};

#[derive(Debug, Default)]
struct State {
    rooms: HashMap<RoomId, Option<Vec<ChatMessage>>>,
    next_room: u64,
    sent: Vec<OutboundMessage>,
    profile: Option<(String, Avatar)>,
    echo: bool,
    fail_sends: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    open: AtomicBool,
    held: watch::Sender<bool>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed)
        }
    }

    /// Wait while room requests are held.
    async fn gate(&self) {
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
    }
}

/// Client side of an in-process connection.
#[derive(Debug)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Server side of an in-process connection.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Create a connected pair and the client's event receiver.
    ///
    /// Nothing is delivered until the remote calls [`MemoryRemote::open`].
    #[must_use]
    pub fn pair() -> (Self, MemoryRemote, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (held, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            open: AtomicBool::new(false),
            held,
            events,
        });
        let remote = MemoryRemote {
            shared: Arc::clone(&shared),
        };
        (Self { shared }, remote, events_rx)
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    async fn create_chat_room(
        &self,
        nickname: &str,
        icon: Avatar,
    ) -> Result<RoomId, TransportError> {
        self.shared.gate().await;
        self.shared.ensure_open()?;

        let mut state = self.shared.state();
        state.next_room += 1;
        let room_id = RoomId::new(format!("room-{}", state.next_room));
        state.rooms.insert(room_id.clone(), None);
        state.profile = Some((nickname.to_string(), icon));
        debug!(room = %room_id, "Memory room created");
        Ok(room_id)
    }

    async fn join_chat_room(
        &self,
        nickname: &str,
        room_id: &RoomId,
        icon: Avatar,
    ) -> Result<JoinedRoom, TransportError> {
        self.shared.gate().await;
        self.shared.ensure_open()?;

        let mut state = self.shared.state();
        let Some(history) = state.rooms.get(room_id).cloned() else {
            return Err(TransportError::Rejected {
                code: codes::ROOM_NOT_FOUND,
                message: format!("room {room_id} not found"),
            });
        };
        state.profile = Some((nickname.to_string(), icon));
        Ok(JoinedRoom {
            room_id: room_id.clone(),
            messages: history.map(|history| history.into_iter().map(Message::from).collect()),
        })
    }

    async fn send_message(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.shared.ensure_open()?;

        let echo = {
            let mut state = self.shared.state();
            if state.fail_sends {
                return Err(TransportError::SendFailed("send refused by remote".into()));
            }
            state.sent.push(message.clone());
            match (&message, state.echo, &state.profile) {
                (OutboundMessage::Chat { body }, true, Some((nickname, icon))) => Some(
                    ChatMessage::new(body.clone()).from_user(nickname.clone(), icon.glyph()),
                ),
                _ => None,
            }
        };
        if let Some(msg) = echo {
            self.shared.emit(TransportEvent::Received(Frame::Message(msg)));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.shared.open.swap(false, Ordering::SeqCst) {
            self.shared.emit(TransportEvent::Closed);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }
}

impl MemoryRemote {
    /// Open the connection.
    pub fn open(&self) {
        if !self.shared.open.swap(true, Ordering::SeqCst) {
            self.shared.emit(TransportEvent::Ready);
        }
    }

    /// Close the connection.
    pub fn close(&self) {
        if self.shared.open.swap(false, Ordering::SeqCst) {
            self.shared.emit(TransportEvent::Closed);
        }
    }

    /// Assign the client its participant ID.
    pub fn assign_identity(&self, user_id: impl Into<String>) {
        self.deliver_frame(Frame::UserId {
            user_id: user_id.into(),
        });
    }

    /// Broadcast a chat message.
    pub fn broadcast(&self, message: ChatMessage) {
        self.deliver_frame(Frame::Message(message));
    }

    /// Publish a typing roster.
    pub fn typing_roster<I, S>(&self, users_typing: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deliver_frame(Frame::TypingPresence {
            users_typing: users_typing.into_iter().map(Into::into).collect(),
        });
    }

    /// Deliver an arbitrary frame.
    pub fn deliver_frame(&self, frame: Frame) {
        self.shared.emit(TransportEvent::Received(frame));
    }

    /// Make a room joinable, optionally with history to replay.
    pub fn add_room(&self, room_id: impl Into<RoomId>, history: Option<Vec<ChatMessage>>) {
        self.shared.state().rooms.insert(room_id.into(), history);
    }

    /// Broadcast the client's own chat messages back to it.
    pub fn set_echo(&self, echo: bool) {
        self.shared.state().echo = echo;
    }

    /// Make every later send fail while the connection stays open.
    pub fn fail_sends(&self, fail: bool) {
        self.shared.state().fail_sends = fail;
    }

    /// Suspend create and join requests until [`release_room_requests`](Self::release_room_requests).
    pub fn hold_room_requests(&self) {
        self.shared.held.send_replace(true);
    }

    /// Let held room requests proceed.
    pub fn release_room_requests(&self) {
        self.shared.held.send_replace(false);
    }

    /// Everything the client has sent, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.shared.state().sent.clone()
    }

    /// The typing flags the client has sent, in order.
    #[must_use]
    pub fn typing_signals(&self) -> Vec<bool> {
        self.shared
            .state()
            .sent
            .iter()
            .filter_map(|msg| match msg {
                OutboundMessage::Typing { typing } => Some(*typing),
                OutboundMessage::Chat { .. } => None,
            })
            .collect()
    }

    /// The chat bodies the client has sent, in order.
    #[must_use]
    pub fn chat_bodies(&self) -> Vec<String> {
        self.shared
            .state()
            .sent
            .iter()
            .filter_map(|msg| match msg {
                OutboundMessage::Chat { body } => Some(body.clone()),
                OutboundMessage::Typing { .. } => None,
            })
            .collect()
    }

    /// The nickname and avatar the client entered its room with.
    #[must_use]
    pub fn profile(&self) -> Option<(String, Avatar)> {
        self.shared.state().profile.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_and_close_emit_once() {
        let (transport, remote, mut events) = MemoryTransport::pair();
        assert!(!transport.is_open());

        remote.open();
        remote.open();
        assert!(transport.is_open());
        remote.close();
        remote.close();

        assert_eq!(events.recv().await, Some(TransportEvent::Ready));
        assert_eq!(events.recv().await, Some(TransportEvent::Closed));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rooms() {
        let (transport, remote, _events) = MemoryTransport::pair();
        remote.open();
        remote.add_room("XYZ", Some(vec![ChatMessage::new("hi")]));

        let created = transport.create_chat_room("Ann", Avatar::Cat).await.unwrap();
        assert_eq!(created, RoomId::new("room-1"));

        let joined = transport
            .join_chat_room("Bob", &RoomId::new("XYZ"), Avatar::Fox)
            .await
            .unwrap();
        assert_eq!(joined.messages.unwrap()[0].body, "hi");
        assert_eq!(remote.profile(), Some(("Bob".to_string(), Avatar::Fox)));

        let err = transport
            .join_chat_room("Bob", &RoomId::new("nope"), Avatar::Fox)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Rejected {
                code: codes::ROOM_NOT_FOUND,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_send_when_closed() {
        let (transport, _remote, _events) = MemoryTransport::pair();
        let err = transport
            .send_message(OutboundMessage::Typing { typing: true })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_echo() {
        let (transport, remote, mut events) = MemoryTransport::pair();
        remote.open();
        remote.set_echo(true);
        transport.create_chat_room("Ann", Avatar::Cat).await.unwrap();

        transport
            .send_message(OutboundMessage::Chat { body: "hi".into() })
            .await
            .unwrap();
        assert_eq!(remote.chat_bodies(), vec!["hi".to_string()]);

        assert_eq!(events.recv().await, Some(TransportEvent::Ready));
        let Some(TransportEvent::Received(Frame::Message(msg))) = events.recv().await else {
            panic!("expected echo");
        };
        assert_eq!(msg.user_nickname.as_deref(), Some("Ann"));
        assert_eq!(msg.user_icon.as_deref(), Some("🐱"));
    }
}
