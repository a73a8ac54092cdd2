//! Agent base behaviors
//!
//! [`RuntimeAgent`] is the raw message-handling unit: one handler per
//! envelope variant, unhandled variants are no-ops. [`ManagedAgent`] is
//! the conversational specialization used for team members; the
//! [`Managed`] adapter hosts any of them on the runtime, enforcing the
//! one-reply-per-speak contract.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::completion::{CompletionClient, ThreadService};
use crate::error::ConclaveError;
use crate::message::{ChatMessage, GroupMessage, Message, ProgressReport, TaskInput, TaskResult};
use crate::runtime::AgentContext;
use crate::topic::{AgentId, TopicId};

/// A message-handling unit hosted by the runtime.
///
/// Every handler defaults to a no-op, so an agent may subscribe to a topic
/// and still ignore the variants it does not care about.
#[async_trait]
pub trait RuntimeAgent: Send {
    /// Identity of this instance.
    fn id(&self) -> &AgentId;

    /// Human-readable description of the agent's purpose.
    fn description(&self) -> &str;

    async fn on_task(&mut self, _task: TaskInput, _ctx: &AgentContext) -> Result<(), ConclaveError> {
        Ok(())
    }

    async fn on_group(
        &mut self,
        _group: GroupMessage,
        _ctx: &AgentContext,
    ) -> Result<(), ConclaveError> {
        Ok(())
    }

    async fn on_result(
        &mut self,
        _result: TaskResult,
        _ctx: &AgentContext,
    ) -> Result<(), ConclaveError> {
        Ok(())
    }

    async fn on_progress(
        &mut self,
        _progress: ProgressReport,
        _ctx: &AgentContext,
    ) -> Result<(), ConclaveError> {
        Ok(())
    }

    async fn on_speak(&mut self, _ctx: &AgentContext) -> Result<(), ConclaveError> {
        Ok(())
    }

    async fn on_reset(&mut self, _ctx: &AgentContext) -> Result<(), ConclaveError> {
        Ok(())
    }

    /// Route an envelope to its handler.
    async fn dispatch(&mut self, message: Message, ctx: &AgentContext) -> Result<(), ConclaveError> {
        match message {
            Message::Task(task) => self.on_task(task, ctx).await,
            Message::Group(group) => self.on_group(group, ctx).await,
            Message::Result(result) => self.on_result(result, ctx).await,
            Message::Progress(progress) => self.on_progress(progress, ctx).await,
            Message::Speak => self.on_speak(ctx).await,
            Message::Reset => self.on_reset(ctx).await,
        }
    }
}

/// A conversational agent with private transcript state.
#[async_trait]
pub trait ManagedAgent: Send {
    fn id(&self) -> &AgentId;

    /// Name used to attribute this agent's chat turns.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Append an inbound chat turn to private state. Never fails.
    async fn on_receive(&mut self, message: ChatMessage);

    /// Discard private state. Failures releasing external resources are
    /// logged, never propagated.
    async fn on_reset(&mut self);

    /// Produce exactly one reply from the accumulated state.
    async fn on_speak(&mut self) -> Result<ChatMessage, ConclaveError>;
}

/// Hosts a [`ManagedAgent`] on the runtime.
///
/// Group traffic feeds the private transcript; a `Speak` trigger produces
/// one group reply. When the inner agent cannot speak, a short inability
/// note is published instead so the manager observes a stall rather than
/// waiting on a reply that will never arrive.
pub struct Managed<A> {
    agent: A,
}

impl<A: ManagedAgent> Managed<A> {
    pub fn new(agent: A) -> Self {
        Self { agent }
    }

    async fn speak_once(&mut self) -> Result<ChatMessage, ConclaveError> {
        let reply = self.agent.on_speak().await?;
        if reply.content.trim().is_empty() {
            return Err(ConclaveError::EmptyReply(self.agent.id().clone()));
        }
        Ok(reply)
    }
}

#[async_trait]
impl<A: ManagedAgent> RuntimeAgent for Managed<A> {
    fn id(&self) -> &AgentId {
        self.agent.id()
    }

    fn description(&self) -> &str {
        self.agent.description()
    }

    async fn on_group(
        &mut self,
        group: GroupMessage,
        _ctx: &AgentContext,
    ) -> Result<(), ConclaveError> {
        self.agent.on_receive(group.message).await;
        Ok(())
    }

    async fn on_reset(&mut self, _ctx: &AgentContext) -> Result<(), ConclaveError> {
        debug!(agent = %self.agent.id(), "Resetting agent state");
        self.agent.on_reset().await;
        Ok(())
    }

    async fn on_speak(&mut self, ctx: &AgentContext) -> Result<(), ConclaveError> {
        match self.speak_once().await {
            Ok(reply) => {
                ctx.publish(reply.to_group(), &TopicId::group())?;
                Ok(())
            }
            Err(e) => {
                warn!(agent = %self.agent.id(), error = %e, "Agent failed to speak");
                let note = ChatMessage::assistant(format!(
                    "{} was unable to respond.",
                    self.agent.name()
                ))
                .with_author(self.agent.name());
                if let Err(publish_error) = ctx.publish(note.to_group(), &TopicId::group()) {
                    warn!(error = %publish_error, "Failed to publish stall note");
                }
                Err(e)
            }
        }
    }
}

/// A team member whose conversation runs through a chat-completion service.
pub struct ChatAgent {
    id: AgentId,
    name: String,
    description: String,
    instructions: String,
    chat: Vec<ChatMessage>,
    client: Arc<dyn CompletionClient>,
}

impl ChatAgent {
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            chat: Vec::new(),
            client,
        }
    }

    /// The accumulated private transcript.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.chat
    }
}

#[async_trait]
impl ManagedAgent for ChatAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn on_receive(&mut self, message: ChatMessage) {
        self.chat.push(message);
    }

    async fn on_reset(&mut self) {
        self.chat.clear();
    }

    async fn on_speak(&mut self) -> Result<ChatMessage, ConclaveError> {
        let mut transcript = Vec::with_capacity(self.chat.len() + 1);
        transcript.push(ChatMessage::system(self.instructions.clone()));
        transcript.extend(self.chat.iter().cloned());

        let response = self.client.complete(&transcript, None).await?;
        let reply = response.with_author(self.name.clone());
        self.chat.push(reply.clone());
        Ok(reply)
    }
}

/// A team member whose conversation lives in a remote thread.
///
/// Inbound turns are buffered locally and forwarded when the agent speaks,
/// so a member that is never selected costs no remote calls.
pub struct ThreadAgent {
    id: AgentId,
    name: String,
    description: String,
    pending: Vec<ChatMessage>,
    thread_id: Option<String>,
    threads: Arc<dyn ThreadService>,
}

impl ThreadAgent {
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        description: impl Into<String>,
        threads: Arc<dyn ThreadService>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            pending: Vec::new(),
            thread_id: None,
            threads,
        }
    }
}

#[async_trait]
impl ManagedAgent for ThreadAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn on_receive(&mut self, message: ChatMessage) {
        self.pending.push(message);
    }

    async fn on_reset(&mut self) {
        // The local handle is released regardless of the remote outcome.
        if let Some(thread_id) = self.thread_id.take() {
            if let Err(e) = self.threads.delete(&thread_id).await {
                warn!(agent = %self.id, error = %e, "Failed to delete remote thread");
            }
        }
        self.pending.clear();
    }

    async fn on_speak(&mut self) -> Result<ChatMessage, ConclaveError> {
        let thread_id = match &self.thread_id {
            Some(thread_id) => thread_id.clone(),
            None => {
                let thread_id = self.threads.create().await?;
                self.thread_id = Some(thread_id.clone());
                thread_id
            }
        };

        for message in self.pending.drain(..) {
            self.threads.append(&thread_id, &message).await?;
        }

        let response = self.threads.run(&thread_id).await?;
        Ok(response.with_author(self.name.clone()))
    }
}
