//! Agent and topic addressing

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source value used when a topic or agent key is not tied to a
/// particular conversation.
pub const DEFAULT_SOURCE: &str = "default";

/// Topic type carrying the shared team conversation.
pub const GROUP_TOPIC: &str = "group-chat";

/// Topic type carrying progress telemetry.
pub const INNER_TOPIC: &str = "inner-chat";

/// Topic type carrying the terminal task result.
pub const RESULT_TOPIC: &str = "task-result";

/// Identity of an agent instance: an agent type plus an instance key.
///
/// Identity is structural; two ids are equal iff both fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId {
    /// The registered agent type.
    pub kind: String,
    /// The instance key, correlated with the source of routed topics.
    pub key: String,
}

impl AgentId {
    /// Create an id for `kind` with the default instance key.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: DEFAULT_SOURCE.to_string(),
        }
    }

    /// Create an id with an explicit instance key.
    pub fn with_key(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.key)
    }
}

/// A named channel to which messages are published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId {
    /// The topic type matched by subscriptions.
    pub kind: String,
    /// The event source, mapped to the instance key of receiving agents.
    pub source: String,
}

impl TopicId {
    /// Create a topic with the default source.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            source: DEFAULT_SOURCE.to_string(),
        }
    }

    /// The shared group-chat topic.
    pub fn group() -> Self {
        Self::new(GROUP_TOPIC)
    }

    /// The progress-telemetry topic.
    pub fn inner() -> Self {
        Self::new(INNER_TOPIC)
    }

    /// The terminal-result topic.
    pub fn result() -> Self {
        Self::new(RESULT_TOPIC)
    }

    /// The private instruction topic for a named team member.
    pub fn for_member(name: &str) -> Self {
        Self::new(format!("{name}-topic"))
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_equality_is_structural() {
        let a = AgentId::with_key("coder", "default");
        let b = AgentId::new("coder");
        let c = AgentId::with_key("coder", "other");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_topic_defaults_source() {
        let topic = TopicId::new("group-chat");
        assert_eq!(topic.source, DEFAULT_SOURCE);
    }

    #[test]
    fn test_member_topic_is_distinct_per_name() {
        assert_ne!(TopicId::for_member("coder"), TopicId::for_member("writer"));
        assert_ne!(TopicId::for_member("coder"), TopicId::group());
    }
}
