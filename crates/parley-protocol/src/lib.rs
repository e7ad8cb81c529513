//! # parley-protocol
//!
//! Wire protocol definitions for the Parley chat client.
//!
//! This crate defines the frames exchanged between a Parley client and a
//! room server, and the length-prefixed MessagePack codec that carries them.
//!
//! ## Frame Types
//!
//! - `CreateRoom` / `JoinRoom` - Room requests, answered by `RoomCreated` / `RoomJoined`
//! - `SendMessage` / `Message` - Outbound chat bodies and their broadcasts
//! - `SetTypingPresence` / `TypingPresence` - Typing signals and roster snapshots
//! - `UserId` - Identity assignment after connect
//! - `Error` - Request failures
//!
//! ## Example
//!
//! ```rust
//! use parley_protocol::{codec, Frame};
//!
//! let frame = Frame::send_message("Hello, room!");
//!
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, ProtocolError};
pub use frames::{codes, ChatMessage, Frame, FrameKind};
