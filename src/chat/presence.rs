//! Typing indicator and online presence.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default time a typing indicator stays on after the last `typing` event.
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Debounced "peer is typing" flag.
///
/// Each `typing` event (re)starts the countdown; the flag reads as cleared
/// once the countdown has elapsed. Time is passed in by the caller so the
/// state machine is independent of any timer.
#[derive(Debug, Clone)]
pub struct TypingIndicator {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl TypingIndicator {
    /// Creates an indicator with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Records a `typing` event received at `now`.
    pub fn on_typing(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    /// Whether the peer counts as typing at `now`. Clears the flag once the
    /// countdown has run out.
    pub fn is_typing(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now < deadline => true,
            Some(_) => {
                self.deadline = None;
                false
            }
            None => false,
        }
    }

    /// Time left before the flag clears, if it is set.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .and_then(|deadline| deadline.checked_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    /// Clears the flag immediately (room change, message received).
    pub fn clear(&mut self) {
        self.deadline = None;
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_TIMEOUT)
    }
}

/// Last known online state per user.
#[derive(Debug, Clone, Default)]
pub struct PresenceTable {
    online: HashMap<String, bool>,
}

impl PresenceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a user's online state.
    pub fn set(&mut self, user: &str, online: bool) {
        self.online.insert(user.trim().to_lowercase(), online);
    }

    /// `Some(state)` if the user has been seen, `None` otherwise.
    pub fn is_online(&self, user: &str) -> Option<bool> {
        self.online.get(&user.trim().to_lowercase()).copied()
    }
}
