//! # Conclave
//!
//! Topic-routed multi-agent orchestration runtime - the deliberating team.
//!
//! This crate coordinates a small team of LLM-backed agents toward
//! completion of a single delegated task. Agents are addressable actors
//! that receive typed messages on named topics, optionally reply, and keep
//! private conversational state. A manager agent synthesizes a working
//! plan, delegates sub-steps by publishing instructions, and recovers from
//! stalls with bounded retries.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────┐
//!                 │            ORCHESTRATOR              │
//!                 │  facts → plan → ledger → delegate    │
//!                 └──────────────────┬───────────────────┘
//!                                    │ publish
//!                                    ▼
//!                 ┌──────────────────────────────────────┐
//!                 │             AGENT RUNTIME             │
//!                 │  subscriptions · factories · mailboxes│
//!                 └──────┬───────────┬───────────┬───────┘
//!                        ▼           ▼           ▼
//!                  ┌──────────┐┌──────────┐┌──────────┐
//!                  │ ChatAgent ││ChatAgent ││  Proxy   │
//!                  │  (member) ││ (member) ││(observer)│
//!                  └──────────┘└──────────┘└──────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Agent**: an addressable actor with private state that reacts to
//!   messages and may produce replies
//! - **Topic**: a named channel; messages are published to topics, never
//!   directly to other agents
//! - **Subscription**: a rule mapping a topic to an agent type, used to
//!   resolve publish targets
//! - **Ledger**: the manager's per-iteration structured judgment of task
//!   status and next delegate
//! - **Team**: the participants available for delegation, keyed by name

pub mod agent;
pub mod completion;
pub mod error;
pub mod ledger;
pub mod message;
pub mod orchestrator;
pub mod prompts;
pub mod proxy;
pub mod runtime;
pub mod session;
pub mod team;
pub mod topic;

pub use agent::{ChatAgent, Managed, ManagedAgent, RuntimeAgent, ThreadAgent};
pub use completion::{CompletionClient, ResponseSchema, ThreadService};
pub use error::ConclaveError;
pub use ledger::{LedgerEntry, LedgerStatus};
pub use message::{
    ChatMessage, ChatRole, GroupMessage, Message, OutcomeKind, ProgressReport, TaskInput,
    TaskResult, TokenUsage,
};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use proxy::{ProxyAgent, RunEvent};
pub use runtime::{AgentContext, AgentRuntime, Subscription};
pub use session::{Session, TaskOutcome};
pub use team::{AgentTeam, TeamMember};
pub use topic::{AgentId, TopicId};
