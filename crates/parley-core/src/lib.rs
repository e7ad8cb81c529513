//! # parley-core
//!
//! Client-side chat session state machine for Parley.
//!
//! This crate holds every piece of state a chat client keeps between
//! transport events, with no I/O of its own:
//!
//! - **ConnectionGate** - Transport readiness and our assigned identity
//! - **RoomController** - Lobby → room transition via create or join
//! - **MessageLog** - Append-only room history
//! - **TypingCoordinator** - Debounced typing signals and the remote indicator
//! - **ChatSession** - Owns all of the above and dispatches inbound events
//!
//! ## Architecture
//!
//! ```text
//!   transport events          user intents           timer
//!         │                        │                   │
//!         ▼                        ▼                   ▼
//!  ┌──────────────┐        ┌──────────────┐    ┌──────────────┐
//!  │ InboundEvent │───────▶│ ChatSession  │◀───│ typing       │
//!  └──────────────┘        └──────────────┘    │ deadline     │
//!                                 │            └──────────────┘
//!                                 ▼
//!                       OutboundMessage / SessionView
//! ```

pub mod avatar;
pub mod error;
pub mod event;
pub mod gate;
pub mod log;
pub mod message;
pub mod room;
pub mod session;
pub mod typing;

pub use avatar::{Avatar, UnknownAvatar};
pub use error::SessionError;
pub use event::InboundEvent;
pub use gate::ConnectionGate;
pub use log::MessageLog;
pub use message::{Message, MessageKind, OutboundMessage, SendKind};
pub use room::{JoinedRoom, RoomController, RoomId, RoomRequest, RoomState};
pub use session::{ChatSession, Notice, Participant, SessionConfig, SessionView};
pub use typing::{TypingCoordinator, TypingSignal, TypingState};
