//! Usernames and room identifiers.
//!
//! Both participants derive the same room id from the two usernames without
//! any coordination: normalise, sort, join with a separator that usernames
//! may not contain.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chat::error::ChatError;

/// Separator between the two usernames of a room id.
pub const ROOM_SEPARATOR: char = '|';

/// Maximum username length in characters, after normalisation.
pub const MAX_USERNAME_LEN: usize = 64;

/// A case-folded, trimmed username.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Normalises and validates a username.
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let normalized = raw.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(ChatError::InvalidUsername(
                "username must not be empty".to_string(),
            ));
        }
        if normalized.chars().count() > MAX_USERNAME_LEN {
            return Err(ChatError::InvalidUsername(format!(
                "username longer than {} characters",
                MAX_USERNAME_LEN
            )));
        }
        if normalized.contains(ROOM_SEPARATOR) {
            return Err(ChatError::InvalidUsername(format!(
                "username must not contain '{}'",
                ROOM_SEPARATOR
            )));
        }
        if normalized.chars().any(char::is_control) {
            return Err(ChatError::InvalidUsername(
                "username must not contain control characters".to_string(),
            ));
        }

        Ok(Self(normalized))
    }

    /// The normalised name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `raw` normalises to this username.
    ///
    /// Used to compare against `from` / `to` fields of incoming envelopes,
    /// which are untrusted and may not be normalised.
    pub fn matches(&self, raw: &str) -> bool {
        raw.trim().to_lowercase() == self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = ChatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

/// The identifier of a two-party room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Derives the room id for two participants. Order-independent.
    pub fn for_pair(a: &Username, b: &Username) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}{}{}", first, ROOM_SEPARATOR, second))
    }

    /// The room id as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `raw` (an untrusted wire value) names this room.
    pub fn matches(&self, raw: &str) -> bool {
        self.0 == raw
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the room id for two raw usernames.
pub fn room_id(user_a: &str, user_b: &str) -> Result<RoomId, ChatError> {
    let a = Username::parse(user_a)?;
    let b = Username::parse(user_b)?;
    Ok(RoomId::for_pair(&a, &b))
}
