//! Session identifiers.

use std::borrow::Borrow;
use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::ConfigError;

/// Bytes of entropy in a generated topic
pub const TOPIC_ENTROPY_BYTES: usize = 16;

/// Opaque per-request identifier.
///
/// Routes frames on the relay, keys the session registry, and serves as the
/// associated data for every envelope in the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Generate a random topic (128 bits, hex encoded)
    pub fn random() -> Self {
        let mut bytes = [0u8; TOPIC_ENTROPY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Use a caller-supplied topic
    pub fn new(topic: impl Into<String>) -> Result<Self, ConfigError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        Ok(Self(topic))
    }

    /// Get the topic as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_topics() {
        let a = Topic::random();
        let b = Topic::random();
        assert_eq!(a.as_str().len(), TOPIC_ENTROPY_BYTES * 2);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_caller_topic() {
        assert_eq!(Topic::new("abc456").unwrap().to_string(), "abc456");
        assert_eq!(Topic::new(""), Err(ConfigError::EmptyTopic));
    }
}
