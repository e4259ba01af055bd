//! In-process broker simulation.
//!
//! [`InMemoryBroker`] mirrors the parts of RabbitMQ semantics the topology
//! relies on: idempotent declarations (with precondition failures on
//! conflicting redeclaration), topic routing, the default exchange, and TTL
//! expiry into a dead-letter target. Time is a logical clock moved forward
//! by [`InMemoryBroker::advance_clock`]; a long-running process drives it
//! from the wall clock with [`InMemoryBroker::spawn_expiry_sweep`].
//!
//! It also records recent publish attempts and supports failure injection,
//! so callers can observe exactly which publishes were attempted. Nothing
//! consumes the queues, so both the attempt log and each queue are capped:
//! a full queue drops its oldest message.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{Broker, BrokerError};
use crate::topology::{
    BindingSpec, ExchangeKind, ExchangeSpec, QueueSpec, DEFAULT_EXCHANGE,
};

/// Publish attempts kept for inspection; older attempts are forgotten.
pub const DEFAULT_ATTEMPT_LOG_CAPACITY: usize = 1_000;

/// Messages a single queue holds before dropping from the head.
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 10_000;

/// Expiry sweep period used by the server binary.
pub const EXPIRY_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// A message sitting in a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    /// Logical clock reading when the message was enqueued.
    pub enqueued_at: Duration,
    /// How many times this message has been dead-lettered.
    pub dead_lettered: u32,
}

impl StoredMessage {
    /// Decode the payload as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

/// One call to [`Broker::publish`], successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAttempt {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub succeeded: bool,
}

#[derive(Debug)]
struct QueueState {
    spec: QueueSpec,
    messages: VecDeque<StoredMessage>,
}

#[derive(Debug)]
struct State {
    exchanges: HashMap<String, ExchangeSpec>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<BindingSpec>,
    /// Most recent attempts, oldest first.
    attempts: VecDeque<PublishAttempt>,
    /// Total attempts ever made; indexes [`InMemoryBroker::fail_attempt`].
    attempt_count: usize,
    attempt_capacity: usize,
    max_queue_depth: usize,
    failing_attempts: HashSet<usize>,
    failing_routing_keys: HashSet<String>,
    offline: bool,
    clock: Duration,
}

impl State {
    fn new(attempt_capacity: usize, max_queue_depth: usize) -> Self {
        Self {
            exchanges: HashMap::new(),
            queues: HashMap::new(),
            bindings: Vec::new(),
            attempts: VecDeque::new(),
            attempt_count: 0,
            attempt_capacity,
            max_queue_depth: max_queue_depth.max(1),
            failing_attempts: HashSet::new(),
            failing_routing_keys: HashSet::new(),
            offline: false,
            clock: Duration::ZERO,
        }
    }

    fn record_attempt(&mut self, attempt: PublishAttempt) {
        self.attempt_count += 1;
        if self.attempt_capacity == 0 {
            return;
        }
        if self.attempts.len() == self.attempt_capacity {
            self.attempts.pop_front();
        }
        self.attempts.push_back(attempt);
    }

    /// Queues that should receive a message published to `exchange`.
    fn route(&self, exchange: &str, routing_key: &str) -> Result<Vec<String>, BrokerError> {
        if exchange == DEFAULT_EXCHANGE {
            return Ok(self
                .queues
                .contains_key(routing_key)
                .then(|| routing_key.to_string())
                .into_iter()
                .collect());
        }

        let spec = self
            .exchanges
            .get(exchange)
            .ok_or_else(|| BrokerError::NotFound(format!("exchange '{exchange}'")))?;

        let mut targets: Vec<String> = Vec::new();
        for binding in self.bindings.iter().filter(|b| b.exchange == exchange) {
            let matched = match spec.kind {
                ExchangeKind::Topic => topic_matches(&binding.routing_key, routing_key),
            };
            if matched && !targets.contains(&binding.queue) {
                targets.push(binding.queue.clone());
            }
        }
        Ok(targets)
    }

    fn enqueue(&mut self, queues: &[String], message: &StoredMessage) {
        let max_depth = self.max_queue_depth;
        for name in queues {
            if let Some(queue) = self.queues.get_mut(name) {
                if queue.messages.len() >= max_depth {
                    queue.messages.pop_front();
                    tracing::debug!(queue = %name, max_depth, "Queue full, oldest message dropped");
                }
                queue.messages.push_back(message.clone());
            }
        }
    }
}

/// In-memory [`Broker`] implementation.
#[derive(Debug)]
pub struct InMemoryBroker {
    state: Mutex<State>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_ATTEMPT_LOG_CAPACITY, DEFAULT_MAX_QUEUE_DEPTH)
    }

    /// Broker keeping at most `attempt_capacity` attempts and at most
    /// `max_queue_depth` messages per queue.
    pub fn with_limits(attempt_capacity: usize, max_queue_depth: usize) -> Self {
        Self {
            state: Mutex::new(State::new(attempt_capacity, max_queue_depth)),
        }
    }

    // -- failure injection --------------------------------------------------

    /// Make the publish attempt with this zero-based index fail.
    pub async fn fail_attempt(&self, index: usize) {
        self.state.lock().await.failing_attempts.insert(index);
    }

    /// Make every publish with this routing key fail.
    pub async fn fail_routing_key(&self, routing_key: impl Into<String>) {
        self.state
            .lock()
            .await
            .failing_routing_keys
            .insert(routing_key.into());
    }

    /// Simulate a lost connection: every operation fails while offline.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    // -- inspection ---------------------------------------------------------

    /// The most recent publish attempts, oldest first.
    pub async fn attempts(&self) -> Vec<PublishAttempt> {
        self.state.lock().await.attempts.iter().cloned().collect()
    }

    /// Total publish attempts, including those no longer in [`attempts`](Self::attempts).
    pub async fn attempt_count(&self) -> usize {
        self.state.lock().await.attempt_count
    }

    pub async fn exchange_count(&self) -> usize {
        self.state.lock().await.exchanges.len()
    }

    pub async fn queue_count(&self) -> usize {
        self.state.lock().await.queues.len()
    }

    pub async fn binding_count(&self) -> usize {
        self.state.lock().await.bindings.len()
    }

    /// Number of messages waiting in `queue` (0 if it does not exist).
    pub async fn queue_depth(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, |q| q.messages.len())
    }

    /// Snapshot of the messages waiting in `queue`.
    pub async fn messages(&self, queue: &str) -> Vec<StoredMessage> {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    // -- time ---------------------------------------------------------------

    /// Move the logical clock forward and expire messages whose queue TTL has
    /// elapsed, re-publishing them to the queue's dead-letter target.
    ///
    /// Returns how many messages were dead-lettered. Expired messages in a
    /// queue without a dead-letter rule are discarded.
    pub async fn advance_clock(&self, by: Duration) -> usize {
        let mut state = self.state.lock().await;
        state.clock += by;
        let now = state.clock;

        let mut expired = Vec::new();
        for queue in state.queues.values_mut() {
            let Some(ttl) = queue.spec.message_ttl else {
                continue;
            };
            let dead_letter = queue.spec.dead_letter.clone();
            let source = queue.spec.name.clone();
            while let Some(front) = queue.messages.front() {
                if now.saturating_sub(front.enqueued_at) < ttl {
                    break;
                }
                if let Some(message) = queue.messages.pop_front() {
                    expired.push((source.clone(), dead_letter.clone(), message));
                }
            }
        }

        let mut rerouted = 0;
        for (source, dead_letter, message) in expired {
            let Some(dl) = dead_letter else {
                tracing::debug!(queue = %source, "Expired message discarded (no dead-letter rule)");
                continue;
            };
            let targets = state
                .route(&dl.exchange, &dl.routing_key)
                .unwrap_or_default();
            let message = StoredMessage {
                exchange: dl.exchange.clone(),
                routing_key: dl.routing_key.clone(),
                enqueued_at: now,
                dead_lettered: message.dead_lettered + 1,
                ..message
            };
            if !targets.is_empty() {
                rerouted += 1;
            }
            state.enqueue(&targets, &message);
        }
        rerouted
    }

    /// Advance the logical clock by real elapsed time every `period`, so TTL
    /// expiry and dead-lettering happen while the process runs.
    ///
    /// The task runs until the returned handle is aborted.
    pub fn spawn_expiry_sweep(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let broker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = Instant::now();
            loop {
                let now = interval.tick().await;
                let expired = broker.advance_clock(now.saturating_duration_since(last)).await;
                last = now;
                if expired > 0 {
                    tracing::debug!(expired, "Expired messages dead-lettered");
                }
            }
        })
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(BrokerError::Unavailable("broker offline".to_string()));
        }
        match state.exchanges.get(&spec.name) {
            Some(existing) if existing != spec => Err(BrokerError::PreconditionFailed(format!(
                "inequivalent declaration for exchange '{}'",
                spec.name
            ))),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(spec.name.clone(), spec.clone());
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(BrokerError::Unavailable("broker offline".to_string()));
        }
        match state.queues.get(&spec.name) {
            Some(existing) if existing.spec != *spec => Err(BrokerError::PreconditionFailed(
                format!("inequivalent declaration for queue '{}'", spec.name),
            )),
            Some(_) => Ok(()),
            None => {
                state.queues.insert(
                    spec.name.clone(),
                    QueueState {
                        spec: spec.clone(),
                        messages: VecDeque::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn bind_queue(&self, spec: &BindingSpec) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(BrokerError::Unavailable("broker offline".to_string()));
        }
        if !state.exchanges.contains_key(&spec.exchange) {
            return Err(BrokerError::NotFound(format!("exchange '{}'", spec.exchange)));
        }
        if !state.queues.contains_key(&spec.queue) {
            return Err(BrokerError::NotFound(format!("queue '{}'", spec.queue)));
        }
        if !state.bindings.contains(spec) {
            state.bindings.push(spec.clone());
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let index = state.attempt_count;
        let injected = state.offline
            || state.failing_attempts.contains(&index)
            || state.failing_routing_keys.contains(routing_key);

        let routed = if injected {
            Err(BrokerError::Unavailable(format!(
                "publish attempt {index} to '{routing_key}' rejected"
            )))
        } else {
            state.route(exchange, routing_key)
        };

        state.record_attempt(PublishAttempt {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
            succeeded: routed.is_ok(),
        });

        let targets = routed?;
        if targets.is_empty() {
            tracing::debug!(exchange, routing_key, "Message unroutable, dropped");
        }
        let message = StoredMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
            enqueued_at: state.clock,
            dead_lettered: 0,
        };
        state.enqueue(&targets, &message);
        Ok(())
    }
}

/// AMQP topic matching: words are dot-separated, `*` matches exactly one
/// word and `#` matches zero or more.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.split_first(), key.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            match_words(rest, key) || (!key.is_empty() && match_words(pattern, &key[1..]))
        }
        (Some((&"*", rest)), Some((_, key_rest))) => match_words(rest, key_rest),
        (Some((word, rest)), Some((key_word, key_rest))) if word == key_word => {
            match_words(rest, key_rest)
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
