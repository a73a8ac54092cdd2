//! Conclave error types

use thiserror::Error;

use crate::topic::{AgentId, TopicId};

/// Errors that can occur in the conclave runtime
#[derive(Debug, Error)]
pub enum ConclaveError {
    /// An agent type was registered twice
    #[error("Agent type already registered: {0}")]
    DuplicateRegistration(String),

    /// No factory registered for an agent type
    #[error("No factory registered for agent type: {0}")]
    UnknownAgentType(String),

    /// A subscription was asked to map a topic it does not match
    #[error("Topic {topic} does not match subscription for {agent_kind}")]
    Routing { topic: TopicId, agent_kind: String },

    /// The completion service failed at the transport level
    #[error("Completion failed: {0}")]
    Completion(String),

    /// A schema-constrained reply did not parse into the expected record
    #[error("Reply does not match the expected structure: {0}")]
    SchemaViolation(String),

    /// An agent was asked to speak and produced no content
    #[error("Agent {0} produced an empty reply")]
    EmptyReply(AgentId),

    /// The stall budget was exhausted across all retries
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// A mailbox or event channel was closed
    #[error("Channel closed for {0}")]
    ChannelClosed(AgentId),
}
