//! Message envelope and chat content types

use serde::{Deserialize, Serialize};

/// The speaker role attached to a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Token usage reported by a completion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// A single turn of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    /// Name of the speaking agent, when known.
    pub author: Option<String>,
    pub content: String,
    /// Usage of the completion call that produced this message, if any.
    pub usage: Option<TokenUsage>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            author: None,
            content: content.into(),
            usage: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Attach the author name.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Convert to a progress report carrying this message's usage.
    pub fn to_progress(&self, label: impl Into<String>) -> ProgressReport {
        ProgressReport {
            label: label.into(),
            input_tokens: self.usage.map(|u| u.input_tokens),
            output_tokens: self.usage.map(|u| u.output_tokens),
            total_tokens: self.usage.map(|u| u.total_tokens),
        }
    }
}

/// The initial user goal delivered to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub input: String,
}

/// A chat turn visible to the whole team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessage {
    pub message: ChatMessage,
}

/// Whether a terminal result is the answer or a failure explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// The terminal answer (or failure explanation) for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub message: ChatMessage,
    pub outcome: OutcomeKind,
}

/// Progress telemetry emitted while the task advances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub label: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Every message kind that flows through the runtime.
///
/// Adding a new kind means adding a handler on interested agents, never a
/// change to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    /// The initial user goal.
    Task(TaskInput),
    /// A chat turn visible to the whole team.
    Group(GroupMessage),
    /// The final answer or failure explanation.
    Result(TaskResult),
    /// Telemetry.
    Progress(ProgressReport),
    /// Zero-payload trigger asking an agent to produce its next reply.
    Speak,
    /// Instructs an agent to discard private state.
    Reset,
}

impl ChatMessage {
    /// Wrap as a group-chat envelope.
    pub fn to_group(self) -> Message {
        Message::Group(GroupMessage { message: self })
    }

    /// Wrap as a terminal-result envelope.
    pub fn to_result(self, outcome: OutcomeKind) -> Message {
        Message::Result(TaskResult {
            message: self,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_carries_usage() {
        let mut message = ChatMessage::assistant("done");
        message.usage = Some(TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        });

        let progress = message.to_progress("Analyzed task...");
        assert_eq!(progress.label, "Analyzed task...");
        assert_eq!(progress.total_tokens, Some(15));
    }

    #[test]
    fn test_progress_without_usage() {
        let progress = ChatMessage::assistant("done").to_progress("step");
        assert_eq!(progress.total_tokens, None);
    }

    #[test]
    fn test_envelope_round_trip() {
        let message = ChatMessage::user("hello").with_author("writer").to_group();
        let json = serde_json::to_string(&message).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }
}
