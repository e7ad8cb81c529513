//! Connection readiness and local identity.

use tracing::{debug, info, warn};

/// Tracks transport readiness and the identifier the transport assigned us.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGate {
    ready: bool,
    closed: bool,
    local_id: Option<String>,
}

impl ConnectionGate {
    /// Create a gate for a connection that is not yet established.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the transport as ready.
    pub fn connection_ready(&mut self) {
        if self.closed {
            warn!("Ready event after close ignored");
            return;
        }
        self.ready = true;
        info!("Connection ready");
    }

    /// Mark the transport as closed. There is no way back from this.
    pub fn connection_closed(&mut self) {
        self.ready = false;
        self.closed = true;
        info!("Connection closed");
    }

    /// Record the identifier assigned by the transport.
    ///
    /// A repeated assignment replaces the previous one, which is returned.
    pub fn assign_identity(&mut self, user_id: impl Into<String>) -> Option<String> {
        let user_id = user_id.into();
        debug!(user_id = %user_id, "Identity assigned");
        self.local_id.replace(user_id)
    }

    /// Check if the transport is ready for requests.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Check if the transport has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The local participant's identifier, once assigned.
    #[must_use]
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }
}
