//! Observer agent bridging run traffic to a display sink

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::agent::RuntimeAgent;
use crate::error::ConclaveError;
use crate::message::{ChatMessage, GroupMessage, ProgressReport, TaskResult};
use crate::runtime::AgentContext;
use crate::topic::AgentId;

/// Traffic observed while a task runs.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A chat turn visible to the whole team.
    Chat(ChatMessage),
    /// Progress telemetry.
    Progress(ProgressReport),
    /// The terminal answer or failure explanation.
    Result(TaskResult),
}

/// Forwards group, progress, and result traffic to an event channel and
/// records the terminal result.
///
/// Sink errors never fail the control loop; a closed receiver simply
/// drops the traffic.
pub struct ProxyAgent {
    id: AgentId,
    events: mpsc::UnboundedSender<RunEvent>,
    result: Arc<Mutex<Option<TaskResult>>>,
}

impl ProxyAgent {
    /// The well-known agent type for [`ProxyAgent`].
    pub const TYPE_ID: &'static str = "proxy";

    pub fn new(
        id: AgentId,
        events: mpsc::UnboundedSender<RunEvent>,
        result: Arc<Mutex<Option<TaskResult>>>,
    ) -> Self {
        Self { id, events, result }
    }
}

#[async_trait]
impl RuntimeAgent for ProxyAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn description(&self) -> &str {
        "Observes the conversation for display."
    }

    async fn on_group(
        &mut self,
        group: GroupMessage,
        _ctx: &AgentContext,
    ) -> Result<(), ConclaveError> {
        let _ = self.events.send(RunEvent::Chat(group.message));
        Ok(())
    }

    async fn on_progress(
        &mut self,
        progress: ProgressReport,
        _ctx: &AgentContext,
    ) -> Result<(), ConclaveError> {
        let _ = self.events.send(RunEvent::Progress(progress));
        Ok(())
    }

    async fn on_result(
        &mut self,
        result: TaskResult,
        _ctx: &AgentContext,
    ) -> Result<(), ConclaveError> {
        *self.result.lock() = Some(result.clone());
        let _ = self.events.send(RunEvent::Result(result));
        Ok(())
    }
}
