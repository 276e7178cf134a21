//! Event correlation cache.
//!
//! Maps a correlation token (the nonce of an outgoing command) to the gateway
//! events observed for it so far. Every pending entry owns a `watch` channel,
//! so resolving one token wakes only the issuer waiting on that token.
//!
//! Lifecycle of a token: `unregistered → pending → resolved → (cleared | expired)`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dankcord_core::{update_text, DankError, MessagePayload, Result};
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// Everything observed for one token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBucket {
    pub messages: Vec<MessagePayload>,
    /// Raw `MESSAGE_UPDATE` fragments for the reply, in arrival order.
    pub updates: Vec<Value>,
    pub interaction_acked: bool,
    pub interaction_succeeded: bool,
    pub interaction_id: Option<String>,
}

impl EventBucket {
    /// Id of the first reply message.
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }

    /// Text to parse: the latest edit wins over the original message.
    pub fn reply_text(&self) -> Option<&str> {
        self.updates
            .iter()
            .rev()
            .find_map(update_text)
            .or_else(|| self.messages.iter().rev().find_map(|m| m.text()))
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.updates.is_empty()
            && !self.interaction_acked
            && !self.interaction_succeeded
    }
}

/// One event routed to a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Message(MessagePayload),
    Update(Value),
    InteractionAck(String),
    InteractionSuccess(String),
}

impl Observation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "new-message",
            Self::Update(_) => "message-update",
            Self::InteractionAck(_) => "interaction-ack",
            Self::InteractionSuccess(_) => "interaction-success",
        }
    }
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

pub type ReadinessCheck = Arc<dyn Fn(&EventBucket) -> bool + Send + Sync>;

/// Minimum event set that answers a command. The cache only evaluates the
/// predicate; it never looks inside payloads itself.
#[derive(Clone, Default)]
pub enum ResolvePolicy {
    /// At least one new message or one interaction success.
    #[default]
    Default,
    Message,
    InteractionSuccess,
    Custom(ReadinessCheck),
}

impl ResolvePolicy {
    pub fn custom(check: impl Fn(&EventBucket) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(check))
    }

    pub fn is_satisfied(&self, bucket: &EventBucket) -> bool {
        match self {
            Self::Default => !bucket.messages.is_empty() || bucket.interaction_succeeded,
            Self::Message => !bucket.messages.is_empty(),
            Self::InteractionSuccess => bucket.interaction_succeeded,
            Self::Custom(check) => check(bucket),
        }
    }
}

impl fmt::Debug for ResolvePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Message => f.write_str("Message"),
            Self::InteractionSuccess => f.write_str("InteractionSuccess"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Externally visible state of a token, published on its watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Resolved,
    Expired,
    Cleared,
}

struct PendingEntry {
    created_at: Instant,
    bucket: EventBucket,
    policy: ResolvePolicy,
    resolved: bool,
    /// Auxiliary ids linked to this token.
    aliases: Vec<String>,
    state_tx: watch::Sender<EntryState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, PendingEntry>,
    aliases: HashMap<String, String>,
    /// Every raw update fragment seen since the last clear, for any token.
    recent_updates: Vec<Value>,
}

impl CacheState {
    fn remove_entry(&mut self, token: &str, final_state: EntryState) -> bool {
        let Some(entry) = self.entries.remove(token) else {
            return false;
        };
        // An alias relinked to a newer token stays with that token.
        for alias in &entry.aliases {
            if self.aliases.get(alias).map(String::as_str) == Some(token) {
                self.aliases.remove(alias);
            }
        }
        entry.state_tx.send_replace(final_state);
        true
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Process-wide store of pending commands.
#[derive(Default)]
pub struct CorrelationCache {
    state: Mutex<CacheState>,
}

impl CorrelationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `token` with the default readiness policy.
    pub async fn register(&self, token: &str) -> Result<()> {
        self.register_with(token, ResolvePolicy::Default).await
    }

    pub async fn register_with(&self, token: &str, policy: ResolvePolicy) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.entries.contains_key(token) {
            return Err(DankError::DuplicateToken(token.to_string()));
        }
        let (state_tx, _) = watch::channel(EntryState::Pending);
        state.entries.insert(
            token.to_string(),
            PendingEntry {
                created_at: Instant::now(),
                bucket: EventBucket::default(),
                policy,
                resolved: false,
                aliases: Vec::new(),
                state_tx,
            },
        );
        debug!(token, "[Cache] Registered");
        Ok(())
    }

    /// Append an event to the token's bucket. Events for unknown tokens are
    /// late or foreign and are dropped. Returns whether the event was kept.
    pub async fn observe(&self, token: &str, observation: Observation) -> bool {
        let mut guard = self.state.lock().await;
        let CacheState {
            entries, aliases, ..
        } = &mut *guard;

        let Some(entry) = entries.get_mut(token) else {
            debug!(token, kind = observation.kind(), "[Cache] Dropping event for unknown token");
            return false;
        };

        let kind = observation.kind();
        let new_alias = match observation {
            Observation::Message(message) => {
                let id = message.id.clone();
                entry.bucket.messages.push(message);
                Some(id)
            }
            Observation::Update(raw) => {
                entry.bucket.updates.push(raw);
                None
            }
            Observation::InteractionAck(id) => {
                entry.bucket.interaction_acked = true;
                entry.bucket.interaction_id = Some(id.clone());
                Some(id)
            }
            Observation::InteractionSuccess(id) => {
                entry.bucket.interaction_succeeded = true;
                entry.bucket.interaction_id.get_or_insert_with(|| id.clone());
                Some(id)
            }
        };
        if let Some(alias) = new_alias {
            if !entry.aliases.contains(&alias) {
                entry.aliases.push(alias.clone());
            }
            aliases.insert(alias, token.to_string());
        }

        if !entry.resolved && entry.policy.is_satisfied(&entry.bucket) {
            entry.resolved = true;
            entry.state_tx.send_replace(EntryState::Resolved);
            info!(token, kind, "[Cache] Token resolved");
        } else {
            debug!(token, kind, "[Cache] Event observed");
        }
        true
    }

    pub async fn is_resolved(&self, token: &str) -> bool {
        let state = self.state.lock().await;
        state.entries.get(token).is_some_and(|e| e.resolved)
    }

    /// Snapshot of a resolved token's bucket.
    pub async fn resolve(&self, token: &str) -> Result<EventBucket> {
        let state = self.state.lock().await;
        match state.entries.get(token) {
            Some(entry) if entry.resolved => Ok(entry.bucket.clone()),
            _ => Err(DankError::NotResolved(token.to_string())),
        }
    }

    /// Forget a token, its linked ids and its update fragments. Also flushes
    /// the shared recent-updates list. Clearing an absent token is a no-op
    /// apart from that flush.
    pub async fn clear(&self, token: &str) {
        let mut state = self.state.lock().await;
        if state.remove_entry(token, EntryState::Cleared) {
            debug!(token, "[Cache] Cleared");
        }
        state.recent_updates.clear();
    }

    /// Link an auxiliary id (interaction id, message id) to a pending token.
    pub async fn link(&self, token: &str, key: &str) -> bool {
        let mut guard = self.state.lock().await;
        let CacheState {
            entries, aliases, ..
        } = &mut *guard;
        let Some(entry) = entries.get_mut(token) else {
            return false;
        };
        if !entry.aliases.iter().any(|a| a == key) {
            entry.aliases.push(key.to_string());
        }
        aliases.insert(key.to_string(), token.to_string());
        true
    }

    /// Token linked to an auxiliary id.
    pub async fn lookup(&self, key: &str) -> Option<String> {
        self.state.lock().await.aliases.get(key).cloned()
    }

    /// Append a raw update fragment to the shared scratch list.
    pub async fn record_update(&self, raw: Value) {
        self.state.lock().await.recent_updates.push(raw);
    }

    /// Raw update fragments seen since the last clear, for any token.
    pub async fn recent_updates(&self) -> Vec<Value> {
        self.state.lock().await.recent_updates.clone()
    }

    pub async fn flush_recent_updates(&self) {
        self.state.lock().await.recent_updates.clear();
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Suspend until `token` resolves, then return its bucket.
    ///
    /// On timeout the entry is cleared and `Timeout` is returned. An entry
    /// expired by the janitor also yields `Timeout`; an entry cleared by
    /// someone else yields `NotResolved`.
    pub async fn wait(&self, token: &str, timeout: Duration) -> Result<EventBucket> {
        let started = Instant::now();
        let mut rx = {
            let state = self.state.lock().await;
            state
                .entries
                .get(token)
                .map(|e| e.state_tx.subscribe())
                .ok_or_else(|| DankError::NotResolved(token.to_string()))?
        };

        let timed_out = tokio::time::timeout(timeout, rx.wait_for(|s| *s != EntryState::Pending))
            .await
            .is_err();
        if timed_out {
            warn!(token, ?timeout, "[Cache] Gave up waiting for reply");
            self.clear(token).await;
            return Err(DankError::Timeout {
                token: token.to_string(),
                waited: timeout,
            });
        }

        let final_state = *rx.borrow();
        match final_state {
            EntryState::Resolved => self.resolve(token).await,
            EntryState::Expired => Err(DankError::Timeout {
                token: token.to_string(),
                waited: started.elapsed(),
            }),
            EntryState::Cleared | EntryState::Pending => {
                Err(DankError::NotResolved(token.to_string()))
            }
        }
    }

    /// Remove entries older than `max_age`, waking their waiters with
    /// `Expired`. Returns how many were removed.
    pub async fn expire_stale(&self, max_age: Duration) -> usize {
        let mut state = self.state.lock().await;
        let stale: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.created_at.elapsed() >= max_age)
            .map(|(token, _)| token.clone())
            .collect();
        for token in &stale {
            state.remove_entry(token, EntryState::Expired);
            warn!(token = %token, ?max_age, "[Cache] Expired stale entry");
        }
        stale.len()
    }

    /// Background task expiring entries older than `max_age` every `interval`.
    pub fn spawn_janitor(self: Arc<Self>, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let expired = self.expire_stale(max_age).await;
                if expired > 0 {
                    info!(expired, "[Cache] Janitor pass");
                }
            }
        })
    }
}
