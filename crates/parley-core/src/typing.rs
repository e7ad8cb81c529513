//! Typing presence.
//!
//! Outbound, [`TypingCoordinator`] debounces keystrokes into a single
//! "typing" signal followed by a single "stopped" signal once the user has
//! been quiet for the configured window. Inbound, [`others_typing`] turns a
//! roster snapshot into the "someone is typing" indicator.
//!
//! ```text
//!            non-empty keystroke / send typing=true
//!   ┌──────┐ ─────────────────────────────────────▶ ┌───────────┐
//!   │ Idle │                                        │ Signaling │ ◀─┐ keystroke /
//!   └──────┘ ◀───────────────────────────────────── └───────────┘ ──┘ re-arm timer
//!            window elapsed or send / send typing=false
//! ```

use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Default quiet period after the last keystroke before typing stops.
pub const DEFAULT_TYPING_WINDOW: Duration = Duration::from_secs(2);

/// A typing presence change to report to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Started,
    Stopped,
}

impl TypingSignal {
    /// The `typing` flag carried on the wire.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        matches!(self, TypingSignal::Started)
    }
}

/// Local typing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState {
    /// Not signaling.
    Idle,
    /// Told the transport we are typing; stops at `deadline` unless re-armed.
    Signaling { deadline: Instant },
}

/// Debounces local keystrokes into typing signals.
///
/// The coordinator owns a single deadline rather than a timer task. The
/// driver sleeps until [`deadline`](Self::deadline) and then calls
/// [`expire`](Self::expire).
#[derive(Debug, Clone)]
pub struct TypingCoordinator {
    state: TypingState,
    window: Duration,
}

impl Default for TypingCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_WINDOW)
    }
}

impl TypingCoordinator {
    /// Create a coordinator with the given quiet window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            state: TypingState::Idle,
            window,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TypingState {
        self.state
    }

    /// Check if a "typing" signal is outstanding.
    #[must_use]
    pub fn is_signaling(&self) -> bool {
        matches!(self.state, TypingState::Signaling { .. })
    }

    /// When the pending "stopped" signal is due, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            TypingState::Idle => None,
            TypingState::Signaling { deadline } => Some(deadline),
        }
    }

    /// The quiet window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Handle a change to the input field. `text` is its current contents.
    pub fn keystroke(&mut self, text: &str, now: Instant) -> Option<TypingSignal> {
        match self.state {
            TypingState::Idle if text.is_empty() => None,
            TypingState::Idle => {
                self.schedule(now);
                Some(TypingSignal::Started)
            }
            TypingState::Signaling { .. } => {
                self.schedule(now);
                None
            }
        }
    }

    /// Fire the timer if its deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.state {
            TypingState::Signaling { deadline } if now >= deadline => {
                self.cancel();
                Some(TypingSignal::Stopped)
            }
            _ => None,
        }
    }

    /// Stop typing because a message is being sent.
    ///
    /// Always yields [`TypingSignal::Stopped`], even when already idle.
    pub fn message_sent(&mut self) -> TypingSignal {
        self.cancel();
        TypingSignal::Stopped
    }

    /// Arm (or re-arm) the timer from `now`.
    fn schedule(&mut self, now: Instant) {
        let deadline = now + self.window;
        trace!(?deadline, "Typing timer armed");
        self.state = TypingState::Signaling { deadline };
    }

    /// Drop any pending timer without producing a signal.
    ///
    /// Returns `true` if a "typing" signal was outstanding.
    pub fn cancel(&mut self) -> bool {
        let was_signaling = self.is_signaling();
        self.state = TypingState::Idle;
        was_signaling
    }
}

/// Whether anyone other than `local_id` appears in a typing roster.
#[must_use]
pub fn others_typing<S: AsRef<str>>(roster: &[S], local_id: Option<&str>) -> bool {
    roster
        .iter()
        .any(|id| Some(id.as_ref()) != local_id)
}
