//! Session wiring for a complete orchestrated run
//!
//! A session assembles the pieces the way an embedding application would:
//! team members registered with their topics, the display proxy, and the
//! orchestrator, then a single task driven to its terminal outcome.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::agent::{ChatAgent, Managed, ThreadAgent};
use crate::completion::{CompletionClient, ThreadService};
use crate::error::ConclaveError;
use crate::message::{Message, OutcomeKind, TaskInput, TaskResult};
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::proxy::{ProxyAgent, RunEvent};
use crate::runtime::AgentRuntime;
use crate::team::{AgentTeam, TeamMember};
use crate::topic::{AgentId, TopicId, GROUP_TOPIC, INNER_TOPIC, RESULT_TOPIC};

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The task completed with a final answer.
    Completed(String),
    /// The task failed with a human-readable explanation.
    Failed(String),
}

/// One orchestrated task run.
///
/// Build a session, add the team, then [`Session::run`] a task. Each task
/// gets its own session (and so its own orchestrator instance), which
/// keeps concurrent task runs independent.
pub struct Session {
    runtime: AgentRuntime,
    client: Arc<dyn CompletionClient>,
    config: OrchestratorConfig,
    members: Vec<(String, TeamMember)>,
    events_tx: mpsc::UnboundedSender<RunEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<RunEvent>>,
    result: Arc<Mutex<Option<TaskResult>>>,
}

impl Session {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            runtime: AgentRuntime::new(),
            client,
            config: OrchestratorConfig::default(),
            members: Vec::new(),
            events_tx,
            events_rx: Some(events_rx),
            result: Arc::new(Mutex::new(None)),
        }
    }

    /// Override the stall/retry bounds.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Take the event stream for live display. Yields `None` once the run
    /// is over and all traffic has been drained.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<RunEvent>> {
        self.events_rx.take()
    }

    /// Add a completion-backed team member.
    pub fn add_chat_agent(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Result<(), ConclaveError> {
        let name = name.into();
        let description = description.into();
        let instructions = instructions.into();

        let client = Arc::clone(&self.client);
        let agent_name = name.clone();
        let agent_description = description.clone();
        self.runtime.register_agent_factory(
            name.clone(),
            Box::new(move |id, _runtime| {
                Box::new(Managed::new(ChatAgent::new(
                    id,
                    agent_name.clone(),
                    agent_description.clone(),
                    instructions.clone(),
                    Arc::clone(&client),
                )))
            }),
        )?;

        self.enroll(name, description)
    }

    /// Add a team member backed by a remote conversation thread.
    pub fn add_thread_agent(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        threads: Arc<dyn ThreadService>,
    ) -> Result<(), ConclaveError> {
        let name = name.into();
        let description = description.into();

        let agent_name = name.clone();
        let agent_description = description.clone();
        self.runtime.register_agent_factory(
            name.clone(),
            Box::new(move |id, _runtime| {
                Box::new(Managed::new(ThreadAgent::new(
                    id,
                    agent_name.clone(),
                    agent_description.clone(),
                    Arc::clone(&threads),
                )))
            }),
        )?;

        self.enroll(name, description)
    }

    fn enroll(&mut self, name: String, description: String) -> Result<(), ConclaveError> {
        let topic = TopicId::for_member(&name);
        self.runtime
            .subscribe(&name, &[GROUP_TOPIC, topic.kind.as_str()]);
        self.members.push((name, TeamMember { topic, description }));
        Ok(())
    }

    /// Drive one task to its terminal outcome.
    #[instrument(skip(self, task))]
    pub async fn run(self, task: impl Into<String>) -> Result<TaskOutcome, ConclaveError> {
        let team = Arc::new(AgentTeam::new(self.members.clone()));
        info!(members = team.len(), "Starting session");

        let events = self.events_tx.clone();
        let result = Arc::clone(&self.result);
        self.runtime.register_agent_factory(
            ProxyAgent::TYPE_ID,
            Box::new(move |id, _runtime| {
                Box::new(ProxyAgent::new(id, events.clone(), Arc::clone(&result)))
            }),
        )?;
        self.runtime
            .subscribe(ProxyAgent::TYPE_ID, &[GROUP_TOPIC, INNER_TOPIC, RESULT_TOPIC]);

        let client = Arc::clone(&self.client);
        let config = self.config;
        self.runtime.register_agent_factory(
            Orchestrator::TYPE_ID,
            Box::new(move |id, _runtime| {
                Box::new(Orchestrator::new(
                    id,
                    Arc::clone(&client),
                    Arc::clone(&team),
                    config,
                ))
            }),
        )?;
        self.runtime.subscribe(Orchestrator::TYPE_ID, &[GROUP_TOPIC]);

        self.runtime.send(
            Message::Task(TaskInput { input: task.into() }),
            &AgentId::new(Orchestrator::TYPE_ID),
        )?;
        self.runtime.run_until_idle().await;

        let outcome = match self.result.lock().take() {
            Some(result) => match result.outcome {
                OutcomeKind::Success => TaskOutcome::Completed(result.message.content),
                OutcomeKind::Failure => TaskOutcome::Failed(result.message.content),
            },
            None => TaskOutcome::Failed("The task ended without producing a result.".to_string()),
        };

        self.runtime.shutdown().await;
        info!(outcome = ?outcome, "Session finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use crate::completion::ResponseSchema;
    use crate::ledger::{LedgerEntry, LedgerStatus};
    use crate::message::ChatMessage;

    /// Serves scripted ledgers on schema-constrained calls and a fixed
    /// synthesis for everything else (facts, plans, member replies, the
    /// final answer).
    struct ScriptedClient {
        statuses: Mutex<VecDeque<LedgerStatus>>,
        last: Mutex<Option<LedgerStatus>>,
    }

    impl ScriptedClient {
        fn new(statuses: Vec<LedgerStatus>) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses.into()),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            schema: Option<&ResponseSchema>,
        ) -> Result<ChatMessage, ConclaveError> {
            if schema.is_none() {
                return Ok(ChatMessage::assistant("synthesized"));
            }

            let status = {
                let mut statuses = self.statuses.lock();
                match statuses.pop_front() {
                    Some(status) => {
                        *self.last.lock() = Some(status.clone());
                        status
                    }
                    None => self.last.lock().clone().expect("script is not empty"),
                }
            };
            Ok(ChatMessage::assistant(
                serde_json::to_string(&status).unwrap(),
            ))
        }
    }

    fn status(name: &str, complete: bool, progressing: bool) -> LedgerStatus {
        let entry = |result: bool| LedgerEntry {
            result,
            reason: "scripted".to_string(),
        };
        LedgerStatus {
            name: name.to_string(),
            instruction: format!("You are up, {name}."),
            reason: "scripted".to_string(),
            is_task_complete: entry(complete),
            is_task_progressing: entry(progressing),
            is_task_in_loop: entry(false),
        }
    }

    fn session(client: Arc<ScriptedClient>) -> Session {
        let mut session = Session::new(client);
        session
            .add_chat_agent("coder", "Writes code.", "You write code.")
            .unwrap();
        session
            .add_chat_agent("writer", "Writes prose.", "You write prose.")
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_run_completes_after_one_delegation() {
        let client = ScriptedClient::new(vec![
            status("coder", false, true),
            status("coder", true, true),
        ]);
        let mut session = session(client);
        let mut events = session.take_events().unwrap();

        let outcome = session.run("build the parser").await.unwrap();
        assert_eq!(outcome, TaskOutcome::Completed("synthesized".to_string()));

        let mut saw_chat = false;
        let mut saw_result = false;
        while let Some(event) = events.recv().await {
            match event {
                RunEvent::Chat(_) => saw_chat = true,
                RunEvent::Result(result) => {
                    saw_result = true;
                    assert_eq!(result.outcome, OutcomeKind::Success);
                }
                RunEvent::Progress(_) => {}
            }
        }
        assert!(saw_chat);
        assert!(saw_result);
    }

    #[tokio::test]
    async fn test_run_fails_when_selection_never_resolves() {
        let client = ScriptedClient::new(vec![status("ghost", false, true)]);
        let session = session(client);

        let outcome = session.run("build the parser").await.unwrap();
        match outcome {
            TaskOutcome::Failed(reason) => {
                assert!(reason.contains("unable to continue"));
            }
            TaskOutcome::Completed(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_member_name_is_rejected() {
        let client = ScriptedClient::new(vec![status("coder", true, true)]);
        let mut session = session(client);

        let result = session.add_chat_agent("coder", "Again.", "You repeat.");
        assert!(matches!(
            result,
            Err(ConclaveError::DuplicateRegistration(_))
        ));
    }
}
