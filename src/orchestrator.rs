//! Manager control loop - delegates the task to team members
//!
//! The orchestrator synthesizes facts and a plan for the task, then
//! iterates: evaluate a status ledger, delegate to the chosen member, and
//! wait for their reply to re-enter via the group topic. Stalls are
//! tolerated up to a bound, then the whole attempt is reset with a fresh
//! look at the task; exhausting the retry budget fails the task.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::agent::RuntimeAgent;
use crate::completion::{parse_structured, CompletionClient, ResponseSchema};
use crate::error::ConclaveError;
use crate::ledger::LedgerStatus;
use crate::message::{ChatMessage, GroupMessage, Message, OutcomeKind, TaskInput};
use crate::prompts;
use crate::runtime::AgentContext;
use crate::team::AgentTeam;
use crate::topic::{AgentId, TopicId};

/// Bounds governing the stall/retry/reset protocol.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Consecutive stalls tolerated before a reset (or failure).
    pub max_stall_count: usize,
    /// Resets allowed before the task is declared failed.
    pub max_retry_count: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_stall_count: 3,
            max_retry_count: 2,
        }
    }
}

/// Where the control loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No task received yet.
    Idle,
    /// Synthesizing facts and plan for a new attempt.
    Preparing,
    /// Choosing the next step.
    Selecting,
    /// Evaluating the ledger.
    Evaluating,
    /// Publishing the instruction to the chosen member.
    Delegating,
    /// Instruction published, waiting for the member's reply.
    AwaitingReply,
    /// Terminal success.
    Completing,
    /// Terminal failure.
    Failing,
}

/// The team manager.
///
/// Subscribed to the group topic; replies from delegated members drive
/// the loop forward.
pub struct Orchestrator {
    id: AgentId,
    team: Arc<AgentTeam>,
    client: Arc<dyn CompletionClient>,
    config: OrchestratorConfig,
    task: Option<String>,
    facts: Option<ChatMessage>,
    plan: Option<ChatMessage>,
    chat: Vec<ChatMessage>,
    stall_count: usize,
    retry_count: usize,
    phase: Phase,
}

impl Orchestrator {
    /// The well-known agent type for [`Orchestrator`].
    pub const TYPE_ID: &'static str = "orchestrator";

    pub fn new(
        id: AgentId,
        client: Arc<dyn CompletionClient>,
        team: Arc<AgentTeam>,
        config: OrchestratorConfig,
    ) -> Self {
        info!(agent = %id, members = team.len(), "Creating orchestrator");

        Self {
            id,
            team,
            client,
            config,
            task: None,
            facts: None,
            plan: None,
            chat: Vec::new(),
            stall_count: 0,
            retry_count: 0,
            phase: Phase::Idle,
        }
    }

    fn name(&self) -> &str {
        &self.id.kind
    }

    fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Completing | Phase::Failing)
    }

    /// Render a prompt into the internal chat and obtain one reply.
    async fn get_response(
        &self,
        internal: &mut Vec<ChatMessage>,
        prompt: String,
        schema: Option<&ResponseSchema>,
    ) -> Result<ChatMessage, ConclaveError> {
        internal.push(ChatMessage::user(prompt));
        let response = self.client.complete(internal, schema).await?;
        internal.push(response.clone());
        Ok(response)
    }

    fn publish_progress(&self, ctx: &AgentContext, message: &ChatMessage, label: &str) {
        let progress = Message::Progress(message.to_progress(label));
        if let Err(e) = ctx.publish(progress, &TopicId::inner()) {
            debug!(error = %e, "Progress not delivered");
        }
    }

    /// Synthesize facts and plan for the first attempt, then seed the
    /// shared transcript with the ledger.
    async fn prepare(&mut self, ctx: &AgentContext) -> Result<(), ConclaveError> {
        self.phase = Phase::Preparing;
        let task = self.task.clone().unwrap_or_default();
        let mut internal = Vec::new();

        if self.facts.is_none() {
            let facts = self
                .get_response(&mut internal, prompts::new_facts(&task), None)
                .await?;
            self.publish_progress(ctx, &facts, "Analyzed task...");
            self.facts = Some(facts);
        }

        if self.plan.is_none() {
            let plan = self
                .get_response(&mut internal, prompts::new_plan(self.team.roster()), None)
                .await?;
            self.publish_progress(ctx, &plan, "Generated plan...");
            self.plan = Some(plan);
        }

        self.seed_ledger(ctx)
    }

    /// Take a fresh look at the task after a reset: re-derive facts and
    /// plan from the accumulated transcript, then re-seed it.
    async fn reset_attempt(&mut self, ctx: &AgentContext) -> Result<(), ConclaveError> {
        self.phase = Phase::Preparing;
        let task = self.task.clone().unwrap_or_default();
        let old_facts = self.facts_text();
        let mut internal: Vec<ChatMessage> = self.chat.drain(..).collect();

        let facts = self
            .get_response(&mut internal, prompts::update_facts(&task, &old_facts), None)
            .await?;
        self.publish_progress(ctx, &facts, "Analyzed task...");
        self.facts = Some(facts);

        let plan = self
            .get_response(&mut internal, prompts::new_plan(self.team.roster()), None)
            .await?;
        self.publish_progress(ctx, &plan, "Generated plan...");
        self.plan = Some(plan);

        self.seed_ledger(ctx)
    }

    /// Render the ledger into the shared transcript and publish it.
    fn seed_ledger(&mut self, ctx: &AgentContext) -> Result<(), ConclaveError> {
        let task = self.task.clone().unwrap_or_default();
        let seed = prompts::ledger(
            &task,
            self.team.roster(),
            &self.facts_text(),
            &self.plan_text(),
        );
        let message = ChatMessage::user(seed).with_author(self.name());
        self.chat.push(message.clone());
        ctx.publish(message.to_group(), &TopicId::group())
    }

    fn facts_text(&self) -> String {
        self.facts
            .as_ref()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    fn plan_text(&self) -> String {
        self.plan
            .as_ref()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Evaluate the ledger against the current transcript.
    async fn analyze_status(&self, ctx: &AgentContext) -> Result<LedgerStatus, ConclaveError> {
        let task = self.task.clone().unwrap_or_default();
        let mut internal = self.chat.clone();
        let prompt = prompts::status(
            &task,
            self.team.roster(),
            self.team.names(),
            &self.facts_text(),
        );

        let response = self
            .get_response(&mut internal, prompt, Some(&LedgerStatus::schema()))
            .await?;
        self.publish_progress(ctx, &response, "Evaluated status...");

        let status: LedgerStatus = parse_structured(&response)?;
        debug!(
            name = %status.name,
            complete = status.is_task_complete.result,
            progressing = status.is_task_progressing.result,
            looping = status.is_task_in_loop.result,
            "Ledger evaluated"
        );
        Ok(status)
    }

    /// Synthesize the final answer and publish the successful result.
    async fn complete_task(&mut self, ctx: &AgentContext) -> Result<(), ConclaveError> {
        let task = self.task.clone().unwrap_or_default();
        let mut internal = self.chat.clone();
        let response = self
            .get_response(&mut internal, prompts::answer(&task), None)
            .await?;

        let answer = response.with_author(self.name());
        ctx.publish(
            answer.to_result(OutcomeKind::Success),
            &TopicId::result(),
        )?;

        self.phase = Phase::Completing;
        info!(agent = %self.id, "Task completed");
        Ok(())
    }

    /// Publish the unrecoverable-failure result.
    fn fail_task(&mut self, ctx: &AgentContext) -> Result<(), ConclaveError> {
        let explanation = ChatMessage::assistant(
            "I've experienced multiple failures and am unable to continue.",
        )
        .with_author(self.name());
        ctx.publish(
            explanation.to_result(OutcomeKind::Failure),
            &TopicId::result(),
        )?;

        self.phase = Phase::Failing;
        warn!(agent = %self.id, retries = self.retry_count, "Task failed");
        Ok(())
    }

    /// One pass of the selection loop.
    ///
    /// Runs until an instruction is delegated (suspending the loop until
    /// the member's reply re-enters via the group topic) or the task
    /// reaches a terminal state. Every fault inside the loop is converted
    /// into stall bookkeeping.
    async fn select(&mut self, ctx: &AgentContext) -> Result<(), ConclaveError> {
        self.phase = Phase::Selecting;
        loop {
            self.phase = Phase::Evaluating;

            let status = match self.analyze_status(ctx).await {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!(error = %e, "Ledger evaluation failed");
                    None
                }
            };

            if let Some(status) = &status {
                if status.is_task_complete.result {
                    match self.complete_task(ctx).await {
                        Ok(()) => return Ok(()),
                        Err(e) => warn!(error = %e, "Answer synthesis failed"),
                    }
                } else if status.is_task_progressing.result && !status.is_task_in_loop.result {
                    if let Some(member) = self.team.get(&status.name) {
                        self.phase = Phase::Delegating;
                        // Forgive a single stall on genuine progress.
                        self.stall_count = self.stall_count.saturating_sub(1);

                        let instruction = ChatMessage::assistant(status.instruction.clone())
                            .with_author(self.name());
                        self.chat.push(instruction.clone());
                        ctx.publish(instruction.to_group(), &TopicId::group())?;
                        ctx.publish(Message::Speak, &member.topic)?;

                        self.phase = Phase::AwaitingReply;
                        debug!(member = %status.name, "Delegated instruction");
                        return Ok(());
                    }

                    debug!(name = %status.name, "Selected name not present in the team");
                }
            }

            // Reaching this point means the iteration stalled.
            self.stall_count += 1;
            debug!(
                stall = self.stall_count,
                retry = self.retry_count,
                "Task stalled"
            );

            if self.stall_count >= self.config.max_stall_count {
                if self.retry_count >= self.config.max_retry_count {
                    return self.fail_task(ctx);
                }

                self.retry_count += 1;
                self.stall_count = 0;
                info!(retry = self.retry_count, "Resetting task");

                ctx.publish(Message::Reset, &TopicId::group())?;
                if let Err(e) = self.reset_attempt(ctx).await {
                    warn!(error = %e, "Reset synthesis failed");
                }
            }
        }
    }
}

#[async_trait]
impl RuntimeAgent for Orchestrator {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn description(&self) -> &str {
        "Coordinates the team toward completing the task."
    }

    #[instrument(skip(self, task, ctx), fields(agent = %self.id))]
    async fn on_task(&mut self, task: TaskInput, ctx: &AgentContext) -> Result<(), ConclaveError> {
        if self.task.is_some() {
            warn!(agent = %self.id, "Task already in progress; ignoring");
            return Ok(());
        }

        info!(agent = %self.id, "Starting task");
        self.task = Some(task.input);

        if let Err(e) = self.prepare(ctx).await {
            warn!(error = %e, "Task preparation failed");
        }
        self.select(ctx).await
    }

    async fn on_group(
        &mut self,
        group: GroupMessage,
        ctx: &AgentContext,
    ) -> Result<(), ConclaveError> {
        if self.is_terminal() {
            debug!(agent = %self.id, "Terminal; ignoring group message");
            return Ok(());
        }

        if group.message.author.as_deref() == Some(self.name()) {
            return Ok(());
        }

        self.chat.push(group.message);

        if self.task.is_some() {
            self.select(ctx).await
        } else {
            Ok(())
        }
    }
}
