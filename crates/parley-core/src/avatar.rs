//! Avatar palette.
//!
//! Participants pick one of a fixed set of eight glyphs to show next to
//! their nickname.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a string names no avatar in the palette.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown avatar: {0}")]
pub struct UnknownAvatar(pub String);

/// One of the eight avatar glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Avatar {
    #[default]
    Robot,
    Cat,
    Panda,
    Fox,
    Tiger,
    Lion,
    Frog,
    Skull,
}

impl Avatar {
    /// The full palette, in display order.
    pub const ALL: [Avatar; 8] = [
        Avatar::Robot,
        Avatar::Cat,
        Avatar::Panda,
        Avatar::Fox,
        Avatar::Tiger,
        Avatar::Lion,
        Avatar::Frog,
        Avatar::Skull,
    ];

    /// The glyph sent on the wire and shown in the room.
    #[must_use]
    pub fn glyph(&self) -> &'static str {
        match self {
            Avatar::Robot => "🤖",
            Avatar::Cat => "🐱",
            Avatar::Panda => "🐼",
            Avatar::Fox => "🦊",
            Avatar::Tiger => "🐯",
            Avatar::Lion => "🦁",
            Avatar::Frog => "🐸",
            Avatar::Skull => "💀",
        }
    }

    /// Lowercase name, usable where emoji input is awkward.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Avatar::Robot => "robot",
            Avatar::Cat => "cat",
            Avatar::Panda => "panda",
            Avatar::Fox => "fox",
            Avatar::Tiger => "tiger",
            Avatar::Lion => "lion",
            Avatar::Frog => "frog",
            Avatar::Skull => "skull",
        }
    }

    /// Zero-based palette position.
    #[must_use]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Look up an avatar by its zero-based palette position.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Look up an avatar by its glyph.
    #[must_use]
    pub fn from_glyph(glyph: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.glyph() == glyph)
    }
}

impl fmt::Display for Avatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

impl FromStr for Avatar {
    type Err = UnknownAvatar;

    /// Accepts a glyph, a name (any case), or a 1-based palette number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(avatar) = Self::from_glyph(s) {
            return Ok(avatar);
        }
        if let Some(avatar) = Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s))
        {
            return Ok(avatar);
        }
        s.parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(Self::from_index)
            .ok_or_else(|| UnknownAvatar(s.to_string()))
    }
}

impl From<Avatar> for String {
    fn from(avatar: Avatar) -> String {
        avatar.glyph().to_string()
    }
}

impl TryFrom<String> for Avatar {
    type Error = UnknownAvatar;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette() {
        let glyphs: Vec<_> = Avatar::ALL.iter().map(Avatar::glyph).collect();
        assert_eq!(glyphs, ["🤖", "🐱", "🐼", "🦊", "🐯", "🦁", "🐸", "💀"]);
        assert_eq!(Avatar::default(), Avatar::Robot);

        for (i, avatar) in Avatar::ALL.into_iter().enumerate() {
            assert_eq!(avatar.index(), i);
            assert_eq!(Avatar::from_index(i), Some(avatar));
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("🐱".parse::<Avatar>(), Ok(Avatar::Cat));
        assert_eq!("Fox".parse::<Avatar>(), Ok(Avatar::Fox));
        assert_eq!("8".parse::<Avatar>(), Ok(Avatar::Skull));
        assert!("0".parse::<Avatar>().is_err());
        assert!("9".parse::<Avatar>().is_err());
        assert_eq!(
            "unicorn".parse::<Avatar>(),
            Err(UnknownAvatar("unicorn".into()))
        );
    }
}
