//! # parley-client
//!
//! Transport layer and async runtime for the Parley chat session.
//!
//! - **ChatTransport** - What the session needs from a connection
//! - **WebSocket** - tokio-tungstenite client speaking the Parley frames
//! - **Memory** - In-process transport with a scriptable remote end
//! - **ChatClient** - Owns a [`parley_core::ChatSession`] on a background task
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parley_client::{ChatClient, WebSocketConfig, WebSocketTransport};
//! use parley_core::{Avatar, SessionConfig};
//! use std::sync::Arc;
//!
//! let (transport, events) = WebSocketTransport::connect(WebSocketConfig::new(url)).await?;
//! let client = ChatClient::start(Arc::new(transport), events, SessionConfig::default());
//!
//! client.create_room("Ann", Avatar::Cat).await?;
//! client.keystroke("hello")?;
//! client.send("hello").await?;
//! ```

pub mod client;
pub mod memory;
pub mod metrics;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use client::{ChatClient, ClientError};
pub use memory::{MemoryRemote, MemoryTransport};
pub use traits::{ChatTransport, TransportError, TransportEvent};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};
