//! The chat client runtime.
//!
//! [`ChatClient::start`] spawns a single task that owns the [`ChatSession`]
//! and multiplexes four sources with `tokio::select!`: transport events,
//! user intents from the handle, completions of in-flight room requests,
//! and the typing timer. Room requests run on a [`JoinSet`] so that inbound
//! events keep flowing while the server is answering.
//!
//! After every step the loop publishes a fresh [`SessionView`] on a watch
//! channel for renderers.

use parley_core::{
    Avatar, ChatSession, JoinedRoom, OutboundMessage, RoomId, RoomRequest, SessionConfig,
    SessionError, SessionView,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::traits::{ChatTransport, TransportError, TransportEvent};

/// Errors returned by [`ChatClient`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session refused the operation.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The transport failed the operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client loop is no longer running.
    #[error("Client has shut down")]
    Shutdown,
}

type RoomReply = oneshot::Sender<Result<RoomId, ClientError>>;

enum Intent {
    CreateRoom {
        nickname: String,
        avatar: Avatar,
        reply: RoomReply,
    },
    JoinRoom {
        nickname: String,
        avatar: Avatar,
        room_id: String,
        reply: RoomReply,
    },
    Keystroke {
        text: String,
    },
    Send {
        body: String,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    DismissNotice,
    Shutdown,
}

enum RoomOutcome {
    Created(Result<RoomId, TransportError>),
    Joined(Result<JoinedRoom, TransportError>),
}

struct RoomCompletion {
    outcome: RoomOutcome,
    reply: RoomReply,
}

/// Handle to a running chat session.
///
/// Dropping the handle stops the session task.
pub struct ChatClient {
    intents: mpsc::UnboundedSender<Intent>,
    view: watch::Receiver<SessionView>,
    task: Option<JoinHandle<()>>,
}

impl ChatClient {
    /// Start the session loop over a transport and its event receiver.
    #[must_use]
    pub fn start(
        transport: Arc<dyn ChatTransport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        config: SessionConfig,
    ) -> Self {
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(config);
        let (view_tx, view_rx) = watch::channel(session.view());

        info!(transport = transport.name(), "Starting chat session");

        let session_loop = SessionLoop {
            session,
            transport,
            room_requests: JoinSet::new(),
            view: view_tx,
        };
        let task = tokio::spawn(session_loop.run(events, intents_rx));

        Self {
            intents: intents_tx,
            view: view_rx,
            task: Some(task),
        }
    }

    /// Create a room and enter it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if the request was refused or the
    /// response did not match it, and [`ClientError::Transport`] if the
    /// server failed it.
    pub async fn create_room(&self, nickname: &str, avatar: Avatar) -> Result<RoomId, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Intent::CreateRoom {
            nickname: nickname.to_string(),
            avatar,
            reply,
        })?;
        rx.await.map_err(|_| ClientError::Shutdown)?
    }

    /// Join an existing room.
    ///
    /// # Errors
    ///
    /// As for [`create_room`](Self::create_room).
    pub async fn join_room(
        &self,
        nickname: &str,
        avatar: Avatar,
        room_id: &str,
    ) -> Result<RoomId, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Intent::JoinRoom {
            nickname: nickname.to_string(),
            avatar,
            room_id: room_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| ClientError::Shutdown)?
    }

    /// Report the current contents of the input field.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Shutdown`] if the loop has stopped.
    pub fn keystroke(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.submit(Intent::Keystroke { text: text.into() })
    }

    /// Send a chat message to the current room.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Session`] if the session refused the send and
    /// [`ClientError::Transport`] if the transport rejected the message.
    pub async fn send(&self, body: impl Into<String>) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Intent::Send {
            body: body.into(),
            reply,
        })?;
        rx.await.map_err(|_| ClientError::Shutdown)?
    }

    /// Acknowledge the outstanding notice.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Shutdown`] if the loop has stopped.
    pub fn dismiss_notice(&self) -> Result<(), ClientError> {
        self.submit(Intent::DismissNotice)
    }

    /// The latest session snapshot.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Watch session snapshots as they change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Stop the loop and close the transport.
    pub async fn shutdown(mut self) {
        debug!("Shutdown requested");
        let _ = self.intents.send(Intent::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Session loop terminated with join error: {}", e);
            }
        }
    }

    fn submit(&self, intent: Intent) -> Result<(), ClientError> {
        self.intents.send(intent).map_err(|_| ClientError::Shutdown)
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("view", &*self.view.borrow())
            .field("running", &self.task.is_some())
            .finish()
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct SessionLoop {
    session: ChatSession,
    transport: Arc<dyn ChatTransport>,
    room_requests: JoinSet<RoomCompletion>,
    view: watch::Sender<SessionView>,
}

impl SessionLoop {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut intents: mpsc::UnboundedReceiver<Intent>,
    ) {
        debug!("Session loop started");
        let mut events_open = true;

        loop {
            let deadline = self.session.typing_deadline();

            tokio::select! {
                // Inbound events first, so a queued Ready is applied before
                // intents submitted right after start
                biased;

                event = events.recv(), if events_open => match event {
                    Some(event) => self.on_transport_event(event),
                    None => {
                        events_open = false;
                        if !self.session.gate().is_closed() {
                            debug!("Transport dropped its event channel");
                            self.on_transport_event(TransportEvent::Closed);
                        }
                    }
                },

                Some(joined) = self.room_requests.join_next(), if !self.room_requests.is_empty() => {
                    match joined {
                        Ok(completion) => self.on_room_completion(completion),
                        Err(e) => {
                            error!("Room request task failed: {}", e);
                            self.session.room_failed(e.to_string());
                        }
                    }
                }

                intent = intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => self.on_intent(intent).await,
                },

                () = typing_timer(deadline) => {
                    if let Some(stopped) = self.session.typing_expired(Instant::now()) {
                        let _ = dispatch(&*self.transport, stopped).await;
                    }
                }
            }

            self.publish();
        }

        self.room_requests.abort_all();
        if let Err(e) = self.transport.close().await {
            debug!("Transport close failed: {}", e);
        }
        debug!("Session loop exited");
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match &event {
            TransportEvent::Ready => metrics::set_connected(true),
            TransportEvent::Closed => metrics::set_connected(false),
            TransportEvent::Received(frame) => metrics::record_frame(frame.kind()),
        }
        self.session.handle_event(event.into());
    }

    async fn on_intent(&mut self, intent: Intent) {
        match intent {
            Intent::CreateRoom {
                nickname,
                avatar,
                reply,
            } => match self.session.begin_create(&nickname, avatar) {
                Ok(request) => self.spawn_room_request(request, reply),
                Err(e) => {
                    let _ = reply.send(Err(e.into()));
                }
            },
            Intent::JoinRoom {
                nickname,
                avatar,
                room_id,
                reply,
            } => match self.session.begin_join(&nickname, avatar, &room_id) {
                Ok(request) => self.spawn_room_request(request, reply),
                Err(e) => {
                    let _ = reply.send(Err(e.into()));
                }
            },
            Intent::Keystroke { text } => {
                if let Some(signal) = self.session.keystroke(&text, Instant::now()) {
                    let _ = dispatch(&*self.transport, signal).await;
                }
            }
            Intent::Send { body, reply } => {
                let result = match self.session.send(&body) {
                    Ok(messages) => {
                        let mut result = Ok(());
                        for message in messages {
                            let is_chat = matches!(message, OutboundMessage::Chat { .. });
                            match dispatch(&*self.transport, message).await {
                                Ok(()) if is_chat => self.session.message_delivered(&body),
                                Ok(()) => {}
                                Err(e) if result.is_ok() => result = Err(e.into()),
                                Err(_) => {}
                            }
                        }
                        result
                    }
                    Err(e) => Err(e.into()),
                };
                let _ = reply.send(result);
            }
            Intent::DismissNotice => {
                self.session.dismiss_notice();
            }
            Intent::Shutdown => {}
        }
    }

    fn spawn_room_request(&mut self, request: RoomRequest, reply: RoomReply) {
        let transport = Arc::clone(&self.transport);
        self.room_requests.spawn(async move {
            let outcome = match request {
                RoomRequest::Create { nickname, avatar } => {
                    RoomOutcome::Created(transport.create_chat_room(&nickname, avatar).await)
                }
                RoomRequest::Join {
                    nickname,
                    avatar,
                    room_id,
                } => RoomOutcome::Joined(
                    transport
                        .join_chat_room(&nickname, &room_id, avatar)
                        .await,
                ),
            };
            RoomCompletion { outcome, reply }
        });
    }

    fn on_room_completion(&mut self, completion: RoomCompletion) {
        let RoomCompletion { outcome, reply } = completion;
        let (op, result) = match outcome {
            RoomOutcome::Created(Ok(room_id)) => (
                "create",
                self.session
                    .room_created(room_id.clone())
                    .map(|()| room_id)
                    .map_err(ClientError::from),
            ),
            RoomOutcome::Joined(Ok(joined)) => {
                let room_id = joined.room_id.clone();
                (
                    "join",
                    self.session
                        .room_joined(joined)
                        .map(|()| room_id)
                        .map_err(ClientError::from),
                )
            }
            RoomOutcome::Created(Err(e)) => ("create", Err(self.room_failed(e))),
            RoomOutcome::Joined(Err(e)) => ("join", Err(self.room_failed(e))),
        };
        metrics::record_room_request(op, result.is_ok());
        let _ = reply.send(result);
    }

    fn room_failed(&mut self, error: TransportError) -> ClientError {
        self.session.room_failed(error.to_string());
        error.into()
    }

    fn publish(&self) {
        let next = self.session.view();
        self.view.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Hand a message to the transport, recording the outcome.
async fn dispatch(
    transport: &dyn ChatTransport,
    message: OutboundMessage,
) -> Result<(), TransportError> {
    let kind = message.kind();
    if let OutboundMessage::Typing { typing } = &message {
        metrics::record_typing(*typing);
    }
    match transport.send_message(message).await {
        Ok(()) => {
            metrics::record_sent(kind);
            Ok(())
        }
        Err(e) => {
            warn!(kind = kind.as_str(), "Send failed: {}", e);
            metrics::record_error("send");
            Err(e)
        }
    }
}

/// Resolve at the typing deadline, or never when idle.
async fn typing_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryRemote, MemoryTransport};
    use parley_core::{Notice, RoomState};
    use parley_protocol::ChatMessage;
    use std::time::Duration;
    use tokio::time::sleep;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn start(config: SessionConfig) -> (ChatClient, MemoryRemote) {
        let (transport, remote, events) = MemoryTransport::pair();
        remote.open();
        remote.assign_identity("me");
        (ChatClient::start(Arc::new(transport), events, config), remote)
    }

    async fn in_room() -> (ChatClient, MemoryRemote) {
        let (client, remote) = start(SessionConfig::default());
        client.create_room("Ann", Avatar::Cat).await.unwrap();
        (client, remote)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room() {
        let (client, remote) = start(SessionConfig::default());
        let room = client.create_room("Ann", Avatar::Cat).await.unwrap();

        let view = client.view();
        assert_eq!(view.room, RoomState::InRoom { room_id: room });
        assert!(view.messages.is_empty());
        let participant = view.participant.unwrap();
        assert_eq!(participant.name, "Ann");
        assert_eq!(participant.icon, Avatar::Cat);
        assert_eq!(participant.local_id.as_deref(), Some("me"));
        assert_eq!(remote.profile(), Some(("Ann".to_string(), Avatar::Cat)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_replays_history() {
        let (client, remote) = start(SessionConfig::default());
        remote.add_room("XYZ", Some(vec![ChatMessage::new("hi").from_user("Ann", "🐱")]));

        let room = client.join_room("Bob", Avatar::Fox, "XYZ").await.unwrap();
        assert_eq!(room, RoomId::new("XYZ"));

        let view = client.view();
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].body, "hi");
        assert_eq!(view.messages[0].display_name(), "Ann");
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_unknown_room() {
        let (client, _remote) = start(SessionConfig::default());

        let err = client
            .join_room("Bob", Avatar::Fox, "nope")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport(TransportError::Rejected { code: 4004, .. })
        ));

        let view = client.view();
        assert_eq!(view.room, RoomState::NoRoom);
        assert!(!view.room_pending);
        assert!(matches!(view.notice, Some(Notice::RoomFailed(_))));

        client.dismiss_notice().unwrap();
        let mut views = client.subscribe();
        views.wait_for(|v| v.notice.is_none()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready() {
        let (transport, _remote, events) = MemoryTransport::pair();
        let client = ChatClient::start(Arc::new(transport), events, SessionConfig::default());

        let err = client.create_room("Ann", Avatar::Cat).await.unwrap_err();
        assert!(matches!(err, ClientError::Session(SessionError::NotReady)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_flow_while_room_request_pending() {
        let (client, remote) = start(SessionConfig::default());
        remote.hold_room_requests();

        let (first, second) = tokio::join!(client.create_room("Ann", Avatar::Cat), async {
            sleep(ms(10)).await;
            let second = client.join_room("Ann", Avatar::Cat, "XYZ").await;

            remote.broadcast(ChatMessage::new("server restarting soon").system());
            let mut views = client.subscribe();
            views
                .wait_for(|v| v.room_pending && v.messages.len() == 1)
                .await
                .unwrap();

            remote.release_room_requests();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(ClientError::Session(SessionError::RoomOperationPending))
        ));
        assert!(!client.view().room_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_burst_then_quiet() {
        let (client, remote) = in_room().await;

        client.keystroke("h").unwrap();
        sleep(ms(500)).await;
        client.keystroke("he").unwrap();
        sleep(ms(500)).await;
        client.keystroke("hel").unwrap();
        sleep(ms(100)).await;
        assert_eq!(remote.typing_signals(), vec![true]);

        sleep(ms(2100)).await;
        assert_eq!(remote.typing_signals(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_stops_typing() {
        let (client, remote) = in_room().await;

        client.keystroke("h").unwrap();
        client.send("hi").await.unwrap();
        assert_eq!(
            remote.sent(),
            vec![
                OutboundMessage::Typing { typing: true },
                OutboundMessage::Chat { body: "hi".into() },
                OutboundMessage::Typing { typing: false },
            ]
        );

        // The cancelled timer never fires
        sleep(ms(3000)).await;
        assert_eq!(remote.typing_signals(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_idle() {
        let (client, remote) = in_room().await;

        client.send("hi").await.unwrap();
        assert_eq!(remote.chat_bodies(), vec!["hi".to_string()]);
        assert_eq!(remote.typing_signals(), vec![false]);

        let err = client.send("").await.unwrap_err();
        assert!(matches!(err, ClientError::Session(SessionError::EmptyMessage)));
        assert_eq!(remote.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_echoed_message_lands_in_log() {
        let (client, remote) = in_room().await;
        remote.set_echo(true);

        client.send("hi").await.unwrap();
        let mut views = client.subscribe();
        let view = views.wait_for(|v| v.messages.len() == 1).await.unwrap();
        assert_eq!(view.messages[0].display_name(), "Ann");
        assert_eq!(view.messages[0].display_icon(), "🐱");
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_echo() {
        let (client, _remote) = start(SessionConfig {
            local_echo: true,
            ..SessionConfig::default()
        });
        client.create_room("Ann", Avatar::Cat).await.unwrap();

        client.send("hi").await.unwrap();
        let view = client.view();
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].body, "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_echo_skipped_when_send_fails() {
        let (client, remote) = start(SessionConfig {
            local_echo: true,
            ..SessionConfig::default()
        });
        client.create_room("Ann", Avatar::Cat).await.unwrap();
        remote.fail_sends(true);

        let err = client.send("lost").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport(TransportError::SendFailed(_))
        ));
        assert!(client.view().messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_indicator() {
        let (client, remote) = in_room().await;
        let mut views = client.subscribe();

        remote.typing_roster(["me", "other1"]);
        views.wait_for(|v| v.someone_typing).await.unwrap();

        remote.typing_roster(["me"]);
        views.wait_for(|v| !v.someone_typing).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect() {
        let (client, remote) = in_room().await;
        client.keystroke("h").unwrap();
        sleep(ms(10)).await;
        assert_eq!(remote.typing_signals(), vec![true]);

        remote.close();
        let mut views = client.subscribe();
        let view = views.wait_for(|v| v.closed).await.unwrap().clone();
        assert_eq!(view.notice, Some(Notice::Disconnected));
        assert!(!view.someone_typing);

        let err = client.send("hi").await.unwrap_err();
        assert!(matches!(err, ClientError::Session(SessionError::Disconnected)));

        // Disconnect notice cannot be dismissed
        client.dismiss_notice().unwrap();
        sleep(ms(10)).await;
        assert_eq!(client.view().notice, Some(Notice::Disconnected));

        // The typing timer was cancelled, no stop signal after close
        sleep(ms(3000)).await;
        assert_eq!(remote.typing_signals(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown() {
        let (client, _remote) = in_room().await;
        let transport_open = client.view().ready;
        assert!(transport_open);
        client.shutdown().await;
    }
}
