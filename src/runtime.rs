//! Topic-routed message runtime
//!
//! The runtime owns the subscription table, the agent-type factory
//! registry, and one mailbox per live agent instance. Publishing resolves
//! matching subscriptions to agent ids, lazily constructs instances, and
//! enqueues the message. Each mailbox is drained by its own task, so an
//! agent never runs two handlers concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::agent::RuntimeAgent;
use crate::error::ConclaveError;
use crate::message::Message;
use crate::topic::{AgentId, TopicId};

/// Constructor for an agent instance, keyed by agent type.
pub type AgentFactory = Box<dyn Fn(AgentId, AgentRuntime) -> Box<dyn RuntimeAgent> + Send + Sync>;

/// A rule mapping a topic type to an agent type.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: Uuid,
    topic_kind: String,
    agent_kind: String,
}

impl Subscription {
    pub fn new(topic_kind: impl Into<String>, agent_kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic_kind: topic_kind.into(),
            agent_kind: agent_kind.into(),
        }
    }

    /// Unique id of this subscription.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether a published topic is covered by this subscription.
    pub fn matches(&self, topic: &TopicId) -> bool {
        topic.kind == self.topic_kind
    }

    /// Resolve the agent instance that should receive a topic.
    ///
    /// The topic source becomes the instance key.
    pub fn map_to_agent(&self, topic: &TopicId) -> Result<AgentId, ConclaveError> {
        if !self.matches(topic) {
            return Err(ConclaveError::Routing {
                topic: topic.clone(),
                agent_kind: self.agent_kind.clone(),
            });
        }

        Ok(AgentId::with_key(
            self.agent_kind.clone(),
            topic.source.clone(),
        ))
    }
}

struct RuntimeInner {
    factories: RwLock<HashMap<String, AgentFactory>>,
    subscriptions: RwLock<Vec<Subscription>>,
    mailboxes: RwLock<HashMap<AgentId, mpsc::UnboundedSender<Message>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    pending: AtomicUsize,
    idle: Notify,
}

impl RuntimeInner {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Shared handle to the message runtime.
///
/// Cloning is cheap; all clones address the same subscription table and
/// instance cache.
#[derive(Clone)]
pub struct AgentRuntime {
    inner: Arc<RuntimeInner>,
}

impl AgentRuntime {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                factories: RwLock::new(HashMap::new()),
                subscriptions: RwLock::new(Vec::new()),
                mailboxes: RwLock::new(HashMap::new()),
                tasks: Mutex::new(Vec::new()),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Install a constructor for an agent type.
    ///
    /// Re-registering an already-bound type is rejected.
    pub fn register_agent_factory(
        &self,
        agent_kind: impl Into<String>,
        factory: AgentFactory,
    ) -> Result<(), ConclaveError> {
        let agent_kind = agent_kind.into();
        let mut factories = self.inner.factories.write();

        if factories.contains_key(&agent_kind) {
            return Err(ConclaveError::DuplicateRegistration(agent_kind));
        }

        debug!(agent_kind = %agent_kind, "Registered agent factory");
        factories.insert(agent_kind, factory);
        Ok(())
    }

    /// Append a subscription to the routing table.
    pub fn add_subscription(&self, subscription: Subscription) {
        self.inner.subscriptions.write().push(subscription);
    }

    /// Subscribe an agent type to a set of topic types.
    pub fn subscribe(&self, agent_kind: &str, topic_kinds: &[&str]) {
        for topic_kind in topic_kinds {
            self.add_subscription(Subscription::new(*topic_kind, agent_kind));
        }
    }

    /// Publish a message from outside the agent graph.
    pub fn publish(&self, message: Message, topic: &TopicId) -> Result<(), ConclaveError> {
        self.publish_from(message, topic, None)
    }

    /// Point-to-point delivery bypassing topic matching.
    pub fn send(&self, message: Message, target: &AgentId) -> Result<(), ConclaveError> {
        let tx = self.ensure_mailbox(target)?;
        self.enqueue(&tx, target, message)
    }

    /// Resolve when no message is queued or in flight.
    pub async fn run_until_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Drop all mailboxes and wait for agent tasks to finish.
    pub async fn shutdown(&self) {
        self.inner.mailboxes.write().clear();
        let handles: Vec<JoinHandle<()>> = self.inner.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        info!("Runtime stopped");
    }

    fn publish_from(
        &self,
        message: Message,
        topic: &TopicId,
        sender: Option<&AgentId>,
    ) -> Result<(), ConclaveError> {
        let mut targets: Vec<AgentId> = Vec::new();
        {
            let subscriptions = self.inner.subscriptions.read();
            for subscription in subscriptions.iter().filter(|s| s.matches(topic)) {
                let target = subscription.map_to_agent(topic)?;
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }

        if targets.is_empty() {
            debug!(topic = %topic, "No subscribers for topic");
            return Ok(());
        }

        for target in targets {
            // The publisher never receives its own message back.
            if sender == Some(&target) {
                continue;
            }

            let tx = self.ensure_mailbox(&target)?;
            self.enqueue(&tx, &target, message.clone())?;
        }

        Ok(())
    }

    /// Obtain the mailbox for an agent, constructing the instance on first
    /// use via its registered factory.
    fn ensure_mailbox(
        &self,
        id: &AgentId,
    ) -> Result<mpsc::UnboundedSender<Message>, ConclaveError> {
        if let Some(tx) = self.inner.mailboxes.read().get(id) {
            return Ok(tx.clone());
        }

        let agent = {
            let factories = self.inner.factories.read();
            let factory = factories
                .get(&id.kind)
                .ok_or_else(|| ConclaveError::UnknownAgentType(id.kind.clone()))?;
            factory(id.clone(), self.clone())
        };

        let mut mailboxes = self.inner.mailboxes.write();
        if let Some(tx) = mailboxes.get(id) {
            // Lost the construction race; the duplicate instance is dropped.
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        mailboxes.insert(id.clone(), tx.clone());
        drop(mailboxes);

        info!(agent = %id, "Created agent instance");

        let ctx = AgentContext {
            runtime: self.clone(),
            id: id.clone(),
        };
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(drain_mailbox(agent, rx, ctx, inner));
        self.inner.tasks.lock().push(handle);

        Ok(tx)
    }

    fn enqueue(
        &self,
        tx: &mpsc::UnboundedSender<Message>,
        target: &AgentId,
        message: Message,
    ) -> Result<(), ConclaveError> {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(message).is_err() {
            self.inner.finish_one();
            return Err(ConclaveError::ChannelClosed(target.clone()));
        }
        Ok(())
    }
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-instance handle given to message handlers for further publishes.
pub struct AgentContext {
    runtime: AgentRuntime,
    id: AgentId,
}

impl AgentContext {
    pub(crate) fn for_agent(runtime: AgentRuntime, id: AgentId) -> Self {
        Self { runtime, id }
    }

    /// Identity of the agent this context belongs to.
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Publish on behalf of this agent; the agent will not receive the
    /// message itself.
    pub fn publish(&self, message: Message, topic: &TopicId) -> Result<(), ConclaveError> {
        self.runtime.publish_from(message, topic, Some(&self.id))
    }

    /// Send directly to another agent.
    pub fn send(&self, message: Message, target: &AgentId) -> Result<(), ConclaveError> {
        self.runtime.send(message, target)
    }
}

async fn drain_mailbox(
    mut agent: Box<dyn RuntimeAgent>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    ctx: AgentContext,
    inner: Arc<RuntimeInner>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = agent.dispatch(message, &ctx).await {
            error!(agent = %ctx.id(), error = %e, "Error handling message");
        }
        inner.finish_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::message::{ChatMessage, GroupMessage};

    struct Probe {
        id: AgentId,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RuntimeAgent for Probe {
        fn id(&self) -> &AgentId {
            &self.id
        }

        fn description(&self) -> &str {
            "records group messages"
        }

        async fn on_group(
            &mut self,
            group: GroupMessage,
            _ctx: &AgentContext,
        ) -> Result<(), ConclaveError> {
            self.log.lock().push(group.message.content);
            Ok(())
        }
    }

    fn register_probe(runtime: &AgentRuntime, kind: &str) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let factory_log = Arc::clone(&log);
        runtime
            .register_agent_factory(
                kind,
                Box::new(move |id, _runtime| {
                    Box::new(Probe {
                        id,
                        log: Arc::clone(&factory_log),
                    })
                }),
            )
            .unwrap();
        log
    }

    fn group(content: &str) -> Message {
        ChatMessage::user(content).to_group()
    }

    #[test]
    fn test_subscription_matches_on_topic_kind() {
        let subscription = Subscription::new("group-chat", "coder");
        assert!(subscription.matches(&TopicId::new("group-chat")));
        assert!(!subscription.matches(&TopicId::new("other")));
    }

    #[test]
    fn test_map_to_agent_uses_topic_source() {
        let subscription = Subscription::new("group-chat", "coder");
        let agent = subscription
            .map_to_agent(&TopicId::new("group-chat"))
            .unwrap();
        assert_eq!(agent, AgentId::new("coder"));
    }

    #[test]
    fn test_map_to_agent_rejects_non_matching_topic() {
        let subscription = Subscription::new("group-chat", "coder");
        let result = subscription.map_to_agent(&TopicId::new("other"));
        assert!(matches!(result, Err(ConclaveError::Routing { .. })));
    }

    #[test]
    fn test_duplicate_factory_registration_is_rejected() {
        let runtime = AgentRuntime::new();
        register_probe(&runtime, "coder");

        let result = runtime.register_agent_factory(
            "coder",
            Box::new(|id, _runtime| {
                Box::new(Probe {
                    id,
                    log: Arc::new(Mutex::new(Vec::new())),
                })
            }),
        );
        assert!(matches!(
            result,
            Err(ConclaveError::DuplicateRegistration(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let runtime = AgentRuntime::new();
        runtime
            .publish(group("hello"), &TopicId::new("nowhere"))
            .unwrap();
        runtime.run_until_idle().await;
    }

    #[tokio::test]
    async fn test_publish_to_unregistered_type_fails() {
        let runtime = AgentRuntime::new();
        runtime.add_subscription(Subscription::new("group-chat", "ghost"));

        let result = runtime.publish(group("hello"), &TopicId::group());
        assert!(matches!(result, Err(ConclaveError::UnknownAgentType(_))));
    }

    #[tokio::test]
    async fn test_publish_routes_to_matching_agents_only() {
        let runtime = AgentRuntime::new();
        let coder_log = register_probe(&runtime, "coder");
        let writer_log = register_probe(&runtime, "writer");

        runtime.subscribe("coder", &["coder-topic", "group-chat"]);
        runtime.subscribe("writer", &["writer-topic", "group-chat"]);

        runtime
            .publish(group("to coder"), &TopicId::new("coder-topic"))
            .unwrap();
        runtime.run_until_idle().await;

        assert_eq!(*coder_log.lock(), vec!["to coder".to_string()]);
        assert!(writer_log.lock().is_empty());

        runtime
            .publish(group("to all"), &TopicId::group())
            .unwrap();
        runtime.run_until_idle().await;

        assert_eq!(coder_log.lock().len(), 2);
        assert_eq!(*writer_log.lock(), vec!["to all".to_string()]);
    }

    #[tokio::test]
    async fn test_messages_arrive_in_publish_order() {
        let runtime = AgentRuntime::new();
        let log = register_probe(&runtime, "coder");
        runtime.subscribe("coder", &["group-chat"]);

        for i in 0..5 {
            runtime
                .publish(group(&format!("message {i}")), &TopicId::group())
                .unwrap();
        }
        runtime.run_until_idle().await;

        let received = log.lock().clone();
        assert_eq!(
            received,
            (0..5).map(|i| format!("message {i}")).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_publisher_does_not_receive_own_message() {
        let runtime = AgentRuntime::new();
        let log = register_probe(&runtime, "coder");
        runtime.subscribe("coder", &["group-chat"]);

        let ctx = AgentContext {
            runtime: runtime.clone(),
            id: AgentId::new("coder"),
        };
        ctx.publish(group("from myself"), &TopicId::group()).unwrap();
        runtime.run_until_idle().await;

        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_delivers_directly() {
        let runtime = AgentRuntime::new();
        let log = register_probe(&runtime, "coder");

        runtime
            .send(group("direct"), &AgentId::new("coder"))
            .unwrap();
        runtime.run_until_idle().await;

        assert_eq!(*log.lock(), vec!["direct".to_string()]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_agent_tasks() {
        let runtime = AgentRuntime::new();
        let log = register_probe(&runtime, "coder");
        runtime.subscribe("coder", &["group-chat"]);

        runtime.publish(group("hello"), &TopicId::group()).unwrap();
        runtime.run_until_idle().await;
        runtime.shutdown().await;

        assert_eq!(log.lock().len(), 1);
    }
}
