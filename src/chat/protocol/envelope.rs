//! The message envelope as it travels over the transport and sits in the
//! history store.
//!
//! Two wire formats coexist:
//!
//! - current: `room, from, to, ts, encrypted, cipherTo, cipherFrom`
//! - legacy:  `room, from, to, ts, encrypted, text`, where `text` is either
//!   plaintext (`encrypted: false`) or a single sealed box (`encrypted: true`)
//!
//! [`MessageEnvelope::format`] discriminates them once, at the boundary.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A chat message record, exactly as carried on the wire.
///
/// All fields are untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Room id the message belongs to.
    pub room: String,
    /// Declared sender.
    pub from: String,
    /// Declared recipient.
    pub to: String,
    /// Milliseconds since the Unix epoch, as stamped by the sender.
    pub ts: u64,
    /// Whether the payload is sealed.
    #[serde(default)]
    pub encrypted: bool,
    /// Box sealed to the recipient's public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_to: Option<String>,
    /// Box sealed to the sender's own public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_from: Option<String>,
    /// Plaintext, or a single legacy box when `encrypted` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// The payload layout of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat<'a> {
    /// Not encrypted; `text` is the message.
    Plain { text: &'a str },
    /// Dual-cipher format. `legacy` is a stray `text` box kept as a last
    /// resort.
    Dual {
        cipher_to: Option<&'a str>,
        cipher_from: Option<&'a str>,
        legacy: Option<&'a str>,
    },
    /// Pre-dual-cipher format: one box in `text`.
    LegacySingle { cipher: &'a str },
    /// Nothing usable: encrypted with no payload, or plain with no text.
    Unreadable,
}

impl MessageEnvelope {
    /// Creates an unencrypted envelope.
    pub fn plain(room: &str, from: &str, to: &str, ts: u64, text: &str) -> Self {
        Self {
            room: room.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            ts,
            encrypted: false,
            cipher_to: None,
            cipher_from: None,
            text: Some(text.to_string()),
        }
    }

    /// Discriminates the payload format.
    pub fn format(&self) -> MessageFormat<'_> {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|s| !s.is_empty())
        }

        if !self.encrypted {
            return match self.text.as_deref() {
                Some(text) => MessageFormat::Plain { text },
                None => MessageFormat::Unreadable,
            };
        }

        let cipher_to = present(&self.cipher_to);
        let cipher_from = present(&self.cipher_from);
        let legacy = present(&self.text);

        match (cipher_to, cipher_from, legacy) {
            (None, None, Some(cipher)) => MessageFormat::LegacySingle { cipher },
            (None, None, None) => MessageFormat::Unreadable,
            _ => MessageFormat::Dual {
                cipher_to,
                cipher_from,
                legacy,
            },
        }
    }

    /// Serializes to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> MessageEnvelope {
        MessageEnvelope {
            room: "alice|bob".to_string(),
            from: "alice".to_string(),
            to: "bob".to_string(),
            ts: 1_700_000_000_000,
            encrypted: true,
            cipher_to: None,
            cipher_from: None,
            text: None,
        }
    }

    #[test]
    fn test_current_wire_field_names() {
        let env = MessageEnvelope {
            cipher_to: Some("AAA".to_string()),
            cipher_from: Some("BBB".to_string()),
            ..base()
        };

        let json: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(json["cipherTo"], "AAA");
        assert_eq!(json["cipherFrom"], "BBB");
        assert_eq!(json["encrypted"], true);
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_legacy_record_parses() {
        let json = r#"{"room":"alice|bob","from":"alice","to":"bob","text":"hi","ts":1}"#;
        let env = MessageEnvelope::from_json(json).unwrap();

        assert!(!env.encrypted);
        assert_eq!(env.format(), MessageFormat::Plain { text: "hi" });
    }

    #[test]
    fn test_format_discrimination() {
        let dual = MessageEnvelope {
            cipher_to: Some("to".to_string()),
            ..base()
        };
        assert_eq!(
            dual.format(),
            MessageFormat::Dual {
                cipher_to: Some("to"),
                cipher_from: None,
                legacy: None
            }
        );

        let legacy = MessageEnvelope {
            text: Some("box".to_string()),
            ..base()
        };
        assert_eq!(legacy.format(), MessageFormat::LegacySingle { cipher: "box" });

        assert_eq!(base().format(), MessageFormat::Unreadable);

        let plain_without_text = MessageEnvelope {
            encrypted: false,
            ..base()
        };
        assert_eq!(plain_without_text.format(), MessageFormat::Unreadable);
    }

    #[test]
    fn test_empty_cipher_fields_ignored() {
        let env = MessageEnvelope {
            cipher_to: Some(String::new()),
            cipher_from: Some(String::new()),
            text: Some("box".to_string()),
            ..base()
        };
        assert_eq!(env.format(), MessageFormat::LegacySingle { cipher: "box" });
    }

    #[test]
    fn test_plain_constructor() {
        let env = MessageEnvelope::plain("alice|bob", "alice", "bob", 5, "hello");
        assert!(!env.encrypted);
        assert_eq!(env.format(), MessageFormat::Plain { text: "hello" });
    }
}
