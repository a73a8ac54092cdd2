//! Opaque model-service capabilities consumed by the runtime

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::ConclaveError;
use crate::message::ChatMessage;

/// A JSON schema constraining a completion reply.
///
/// The runtime treats the schema as an opaque value; only the completion
/// service interprets it.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: serde_json::Value,
}

/// A chat-completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Produce one reply to the given transcript.
    ///
    /// When `schema` is set, the reply content must be JSON conforming to
    /// it; callers parse with [`parse_structured`].
    async fn complete(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> Result<ChatMessage, ConclaveError>;
}

/// A remote conversation-thread service backing a [`crate::ThreadAgent`].
#[async_trait]
pub trait ThreadService: Send + Sync {
    /// Create a new thread and return its id.
    async fn create(&self) -> Result<String, ConclaveError>;

    /// Append a message to a thread.
    async fn append(&self, thread_id: &str, message: &ChatMessage) -> Result<(), ConclaveError>;

    /// Run the thread and return the reply.
    async fn run(&self, thread_id: &str) -> Result<ChatMessage, ConclaveError>;

    /// Delete a thread.
    async fn delete(&self, thread_id: &str) -> Result<(), ConclaveError>;
}

/// Parse a schema-constrained reply into a typed record.
pub fn parse_structured<T: DeserializeOwned>(message: &ChatMessage) -> Result<T, ConclaveError> {
    if message.content.trim().is_empty() {
        return Err(ConclaveError::SchemaViolation("reply is empty".into()));
    }

    serde_json::from_str(&message.content)
        .map_err(|e| ConclaveError::SchemaViolation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Record {
        name: String,
    }

    #[test]
    fn test_parse_structured() {
        let message = ChatMessage::assistant(r#"{"name": "coder"}"#);
        let record: Record = parse_structured(&message).unwrap();
        assert_eq!(record.name, "coder");
    }

    #[test]
    fn test_parse_structured_rejects_malformed() {
        let message = ChatMessage::assistant("not json");
        let result: Result<Record, _> = parse_structured(&message);
        assert!(matches!(result, Err(ConclaveError::SchemaViolation(_))));
    }

    #[test]
    fn test_parse_structured_rejects_empty() {
        let message = ChatMessage::assistant("   ");
        let result: Result<Record, _> = parse_structured(&message);
        assert!(matches!(result, Err(ConclaveError::SchemaViolation(_))));
    }
}
