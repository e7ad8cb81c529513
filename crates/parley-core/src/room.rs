//! Room membership.
//!
//! A session starts in [`RoomState::NoRoom`] and moves to
//! [`RoomState::InRoom`] once a create or join request succeeds. There is no
//! way back: leaving or switching rooms is not supported.

use crate::avatar::Avatar;
use crate::error::SessionError;
use crate::message::Message;
use std::fmt;
use tracing::{debug, info};

/// A room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Create a room ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for RoomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where the session is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoomState {
    /// In the lobby.
    #[default]
    NoRoom,
    /// Inside a room. Its history is the session's message log.
    InRoom { room_id: RoomId },
}

impl RoomState {
    /// The current room, if any.
    #[must_use]
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            RoomState::NoRoom => None,
            RoomState::InRoom { room_id } => Some(room_id),
        }
    }
}

/// A validated request to enter a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomRequest {
    /// Create a fresh room.
    Create { nickname: String, avatar: Avatar },
    /// Join a room by ID.
    Join {
        nickname: String,
        avatar: Avatar,
        room_id: RoomId,
    },
}

impl RoomRequest {
    /// Build a create request.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptyNickname`] if the nickname is blank.
    pub fn create(nickname: &str, avatar: Avatar) -> Result<Self, SessionError> {
        Ok(RoomRequest::Create {
            nickname: validate_nickname(nickname)?,
            avatar,
        })
    }

    /// Build a join request.
    ///
    /// # Errors
    ///
    /// Returns an error if the nickname or room ID is blank.
    pub fn join(nickname: &str, avatar: Avatar, room_id: &str) -> Result<Self, SessionError> {
        let nickname = validate_nickname(nickname)?;
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(SessionError::EmptyRoomId);
        }
        Ok(RoomRequest::Join {
            nickname,
            avatar,
            room_id: RoomId::new(room_id),
        })
    }

    /// The nickname to enter with.
    #[must_use]
    pub fn nickname(&self) -> &str {
        match self {
            RoomRequest::Create { nickname, .. } | RoomRequest::Join { nickname, .. } => nickname,
        }
    }

    /// The avatar to enter with.
    #[must_use]
    pub fn avatar(&self) -> Avatar {
        match self {
            RoomRequest::Create { avatar, .. } | RoomRequest::Join { avatar, .. } => *avatar,
        }
    }
}

fn validate_nickname(nickname: &str) -> Result<String, SessionError> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(SessionError::EmptyNickname);
    }
    Ok(nickname.to_string())
}

/// A successful join, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRoom {
    /// The room that was joined.
    pub room_id: RoomId,
    /// Replayed history, if the room had any.
    pub messages: Option<Vec<Message>>,
}

/// Drives the lobby → room transition.
///
/// At most one request may be in flight. A completion that does not match
/// the outstanding request is an error and abandons that request.
#[derive(Debug, Clone, Default)]
pub struct RoomController {
    state: RoomState,
    pending: Option<RoomRequest>,
}

impl RoomController {
    /// Create a controller in the lobby.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current room state.
    #[must_use]
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    /// The current room, if any.
    #[must_use]
    pub fn room_id(&self) -> Option<&RoomId> {
        self.state.room_id()
    }

    /// The outstanding request, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&RoomRequest> {
        self.pending.as_ref()
    }

    /// Start a request.
    ///
    /// # Errors
    ///
    /// Fails if already in a room or another request is outstanding.
    pub fn begin(&mut self, request: RoomRequest) -> Result<(), SessionError> {
        if let Some(room_id) = self.state.room_id() {
            return Err(SessionError::AlreadyInRoom(room_id.clone()));
        }
        if self.pending.is_some() {
            return Err(SessionError::RoomOperationPending);
        }
        debug!(?request, "Room request started");
        self.pending = Some(request);
        Ok(())
    }

    /// Complete an outstanding create request.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnexpectedResponse`] if no create is pending.
    /// The outstanding request is dropped either way.
    pub fn complete_create(&mut self, room_id: RoomId) -> Result<RoomRequest, SessionError> {
        match self.pending.take() {
            Some(request @ RoomRequest::Create { .. }) => {
                info!(room = %room_id, "Room created");
                self.state = RoomState::InRoom { room_id };
                Ok(request)
            }
            _ => Err(SessionError::UnexpectedResponse(format!(
                "room {room_id} created without a pending create"
            ))),
        }
    }

    /// Complete an outstanding join request.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnexpectedResponse`] if no join is pending or
    /// the transport joined a different room than requested.
    pub fn complete_join(&mut self, room_id: RoomId) -> Result<RoomRequest, SessionError> {
        match self.pending.take() {
            Some(request @ RoomRequest::Join { .. }) => {
                if let RoomRequest::Join { room_id: wanted, .. } = &request {
                    if *wanted != room_id {
                        return Err(SessionError::UnexpectedResponse(format!(
                            "asked to join {wanted}, joined {room_id}"
                        )));
                    }
                }
                info!(room = %room_id, "Room joined");
                self.state = RoomState::InRoom { room_id };
                Ok(request)
            }
            _ => Err(SessionError::UnexpectedResponse(format!(
                "room {room_id} joined without a pending join"
            ))),
        }
    }

    /// Abandon the outstanding request, staying in the lobby.
    pub fn fail(&mut self) -> Option<RoomRequest> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert_eq!(
            RoomRequest::create("", Avatar::Cat),
            Err(SessionError::EmptyNickname)
        );
        assert_eq!(
            RoomRequest::create("   ", Avatar::Cat),
            Err(SessionError::EmptyNickname)
        );
        assert_eq!(
            RoomRequest::join("Bob", Avatar::Fox, " "),
            Err(SessionError::EmptyRoomId)
        );

        let request = RoomRequest::join(" Bob ", Avatar::Fox, "XYZ").unwrap();
        assert_eq!(request.nickname(), "Bob");
        assert_eq!(request.avatar(), Avatar::Fox);
    }

    #[test]
    fn test_create_flow() {
        let mut rooms = RoomController::new();
        rooms
            .begin(RoomRequest::create("Ann", Avatar::Cat).unwrap())
            .unwrap();
        assert!(rooms.pending().is_some());

        rooms.complete_create(RoomId::new("r-1")).unwrap();
        assert_eq!(rooms.room_id(), Some(&RoomId::new("r-1")));
        assert!(rooms.pending().is_none());

        // One-way
        assert_eq!(
            rooms.begin(RoomRequest::create("Ann", Avatar::Cat).unwrap()),
            Err(SessionError::AlreadyInRoom(RoomId::new("r-1")))
        );
    }

    #[test]
    fn test_single_pending_request() {
        let mut rooms = RoomController::new();
        rooms
            .begin(RoomRequest::create("Ann", Avatar::Cat).unwrap())
            .unwrap();
        assert_eq!(
            rooms.begin(RoomRequest::join("Ann", Avatar::Cat, "XYZ").unwrap()),
            Err(SessionError::RoomOperationPending)
        );

        assert!(rooms.fail().is_some());
        assert!(rooms.fail().is_none());
        assert_eq!(rooms.state(), &RoomState::NoRoom);
    }

    #[test]
    fn test_mismatched_completion() {
        let mut rooms = RoomController::new();
        rooms
            .begin(RoomRequest::create("Ann", Avatar::Cat).unwrap())
            .unwrap();

        // A join response does not satisfy a create
        assert!(rooms.complete_join(RoomId::new("XYZ")).is_err());
        assert!(rooms.pending().is_none());
        assert_eq!(rooms.state(), &RoomState::NoRoom);

        // Nor does a completion with nothing pending
        assert!(rooms.complete_create(RoomId::new("r-1")).is_err());
    }

    #[test]
    fn test_join_wrong_room() {
        let mut rooms = RoomController::new();
        rooms
            .begin(RoomRequest::join("Bob", Avatar::Fox, "XYZ").unwrap())
            .unwrap();

        assert!(matches!(
            rooms.complete_join(RoomId::new("ABC")),
            Err(SessionError::UnexpectedResponse(_))
        ));
        assert_eq!(rooms.state(), &RoomState::NoRoom);
        assert!(rooms.pending().is_none());
    }
}
