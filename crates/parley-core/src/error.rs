//! Session errors.

use crate::room::RoomId;
use thiserror::Error;

/// Errors raised by [`ChatSession`](crate::ChatSession) operations.
///
/// Everything except [`Disconnected`](SessionError::Disconnected) and
/// [`UnexpectedResponse`](SessionError::UnexpectedResponse) is a failed
/// precondition: the operation was refused and no state changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Nickname was empty.
    #[error("Enter a nickname first")]
    EmptyNickname,

    /// Room ID was empty.
    #[error("Enter a room ID to join")]
    EmptyRoomId,

    /// Message body was empty.
    #[error("Cannot send an empty message")]
    EmptyMessage,

    /// Transport has not reported ready yet.
    #[error("Not connected yet")]
    NotReady,

    /// Transport closed. The session cannot recover.
    #[error("Disconnected, restart to reconnect")]
    Disconnected,

    /// Already inside a room.
    #[error("Already in room {0}")]
    AlreadyInRoom(RoomId),

    /// A create or join is still in flight.
    #[error("A room request is already in progress")]
    RoomOperationPending,

    /// Operation requires a room.
    #[error("Not in a room")]
    NotInRoom,

    /// Transport answered something that does not match the request.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl SessionError {
    /// Check if the session is permanently unusable after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Disconnected)
    }
}
