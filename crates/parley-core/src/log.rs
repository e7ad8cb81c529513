//! Append-only message log.

use crate::message::Message;
use std::slice;
use tracing::debug;

/// Ordered chat history for the current room.
///
/// Messages are kept in arrival order and never reordered or deduplicated.
/// The only non-append mutation is [`seed`](Self::seed), which replaces the
/// contents with replayed history and is accepted once.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
    seeded: bool,
}

impl MessageLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn append(&mut self, message: Message) {
        self.entries.push(message);
    }

    /// Replace the contents with replayed history.
    ///
    /// Returns `false`, leaving the log untouched, if it was already seeded.
    pub fn seed(&mut self, history: Vec<Message>) -> bool {
        if self.seeded {
            return false;
        }
        debug!(
            replaced = self.entries.len(),
            seeded = history.len(),
            "Seeding message log"
        );
        self.entries = history;
        self.seeded = true;
        true
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All messages in display order.
    #[must_use]
    pub fn as_slice(&self) -> &[Message] {
        &self.entries
    }

    /// Messages after the first `seen`, for incremental rendering.
    #[must_use]
    pub fn since(&self, seen: usize) -> &[Message] {
        self.entries.get(seen..).unwrap_or_default()
    }

    /// The most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    /// Iterate over messages in display order.
    pub fn iter(&self) -> slice::Iter<'_, Message> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Message;
    type IntoIter = slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut log = MessageLog::new();
        log.append(Message::user("one", "Ann", "🐱"));
        log.append(Message::user("one", "Ann", "🐱"));
        log.append(Message::system("two"));

        // Duplicates are kept
        let bodies: Vec<_> = log.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["one", "one", "two"]);
        assert_eq!(log.last().map(|m| m.body.as_str()), Some("two"));
    }

    #[test]
    fn test_seed_once() {
        let mut log = MessageLog::new();
        log.append(Message::system("stale"));

        assert!(log.seed(vec![Message::system("hi")]));
        assert_eq!(log.len(), 1);
        assert_eq!(log.as_slice()[0].body, "hi");

        assert!(!log.seed(Vec::new()));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_since() {
        let mut log = MessageLog::new();
        log.append(Message::system("a"));
        log.append(Message::system("b"));

        assert_eq!(log.since(1).len(), 1);
        assert!(log.since(2).is_empty());
        assert!(log.since(10).is_empty());
    }
}
