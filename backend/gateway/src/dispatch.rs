//! Dispatcher: routes gateway events into the correlation cache and turns
//! resolved buckets into `CommandResult`s.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dankcord_commands::{check_cooldown, CommandFamily, ExtractContext, ReplyParser};
use dankcord_core::{CommandResult, DankError, GatewayEvent, MessagePayload, Result};
use dankcord_logging::{CommandEvent, CommandEventLogger};
use serde_json::Value;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::cache::{CorrelationCache, EventBucket, Observation, ResolvePolicy};
use crate::nonce::NonceGenerator;

/// A command ready to be sent to the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingCommand {
    pub nonce: String,
    pub channel_id: u64,
    pub content: String,
    pub family: CommandFamily,
}

/// Sends commands to Discord. The dispatcher never talks HTTP itself.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn send_command(&self, command: &OutgoingCommand) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandRequest {
    pub family: Option<CommandFamily>,
    pub context: ExtractContext,
}

impl CommandRequest {
    pub fn new(family: CommandFamily) -> Self {
        Self {
            family: Some(family),
            context: ExtractContext::default(),
        }
    }

    pub fn trade(family: CommandFamily, item: impl Into<String>, quantity: u64) -> Self {
        Self {
            family: Some(family),
            context: ExtractContext::trade(item, quantity),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Channel commands go to and replies come from. `0` accepts any channel.
    pub channel_id: u64,
    pub command_prefix: String,
    pub reply_timeout: Duration,
    /// Our own user id. Without it, a non-bot message carrying a nonce is
    /// taken to be our echo.
    pub self_user_id: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            channel_id: 0,
            command_prefix: "pls".into(),
            reply_timeout: Duration::from_secs(30),
            self_user_id: None,
        }
    }
}

/// Readiness rule for a family's replies.
///
/// Button-driven replies (search, crime, postmemes) arrive as a prompt that is
/// edited into the outcome, so they wait for an update fragment unless the
/// first message is already a cooldown notice.
pub fn policy_for(family: CommandFamily) -> ResolvePolicy {
    if family.edits_reply() {
        ResolvePolicy::custom(|bucket: &EventBucket| {
            !bucket.messages.is_empty()
                && (!bucket.updates.is_empty()
                    || bucket
                        .messages
                        .iter()
                        .filter_map(MessagePayload::text)
                        .any(check_cooldown))
        })
    } else {
        ResolvePolicy::Message
    }
}

pub struct Dispatcher {
    cache: Arc<CorrelationCache>,
    parser: Arc<ReplyParser>,
    nonces: NonceGenerator,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(cache: Arc<CorrelationCache>, parser: Arc<ReplyParser>, config: DispatcherConfig) -> Self {
        Self {
            cache,
            parser,
            nonces: NonceGenerator::new(),
            config,
        }
    }

    pub fn cache(&self) -> &Arc<CorrelationCache> {
        &self.cache
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Consume gateway events in stream order until the stream ends.
    pub async fn run<S>(&self, events: S)
    where
        S: Stream<Item = GatewayEvent>,
    {
        tokio::pin!(events);
        let mut routed = 0u64;
        while let Some(event) = events.next().await {
            if self.route(event).await {
                routed += 1;
            }
        }
        info!(routed, "[Dispatcher] Event stream ended");
    }

    /// Attach one event to the token it answers. Returns whether the event
    /// reached a pending entry.
    pub async fn route(&self, event: GatewayEvent) -> bool {
        match event {
            GatewayEvent::MessageCreate(message) => self.route_message(message).await,
            GatewayEvent::MessageUpdate(raw) => self.route_update(raw).await,
            GatewayEvent::InteractionCreate {
                interaction_id,
                nonce,
            } => {
                self.route_interaction(nonce, &interaction_id, Observation::InteractionAck(interaction_id.clone()))
                    .await
            }
            GatewayEvent::InteractionSuccess {
                interaction_id,
                nonce,
            } => {
                self.route_interaction(
                    nonce,
                    &interaction_id,
                    Observation::InteractionSuccess(interaction_id.clone()),
                )
                .await
            }
        }
    }

    async fn route_message(&self, message: MessagePayload) -> bool {
        if !self.in_channel(&message) {
            debug!(channel = %message.channel_id, "[Dispatcher] Ignoring message from another channel");
            return false;
        }

        if self.is_echo(&message) {
            return match message.nonce.as_deref() {
                Some(nonce) => {
                    let linked = self.cache.link(nonce, &message.id).await;
                    debug!(nonce, message_id = %message.id, linked, "[Dispatcher] Linked command echo");
                    linked
                }
                None => false,
            };
        }

        let token = match message.nonce.clone() {
            Some(nonce) => Some(nonce),
            None => self.token_for_reply(&message).await,
        };
        let Some(token) = token else {
            debug!(message_id = %message.id, "[Dispatcher] Uncorrelated message");
            return false;
        };
        self.cache.observe(&token, Observation::Message(message)).await
    }

    async fn token_for_reply(&self, message: &MessagePayload) -> Option<String> {
        if let Some(id) = message.interaction_id() {
            if let Some(token) = self.cache.lookup(id).await {
                return Some(token);
            }
        }
        match message.referenced_message_id() {
            Some(id) => self.cache.lookup(id).await,
            None => None,
        }
    }

    async fn route_update(&self, raw: Value) -> bool {
        self.cache.record_update(raw.clone()).await;

        let token = match raw.get("nonce").and_then(Value::as_str) {
            Some(nonce) => Some(nonce.to_string()),
            None => match raw.get("id").and_then(Value::as_str) {
                Some(id) => self.cache.lookup(id).await,
                None => None,
            },
        };
        let Some(token) = token else {
            debug!("[Dispatcher] Uncorrelated message update");
            return false;
        };
        self.cache.observe(&token, Observation::Update(raw)).await
    }

    async fn route_interaction(
        &self,
        nonce: Option<String>,
        interaction_id: &str,
        observation: Observation,
    ) -> bool {
        let token = match nonce {
            Some(nonce) => Some(nonce),
            None => self.cache.lookup(interaction_id).await,
        };
        let Some(token) = token else {
            debug!(interaction_id, "[Dispatcher] Uncorrelated interaction event");
            return false;
        };
        self.cache.link(&token, interaction_id).await;
        self.cache.observe(&token, observation).await
    }

    fn in_channel(&self, message: &MessagePayload) -> bool {
        self.config.channel_id == 0 || message.channel_id == self.config.channel_id.to_string()
    }

    fn is_echo(&self, message: &MessagePayload) -> bool {
        match (&self.config.self_user_id, &message.author) {
            (Some(me), _) => message.author_id() == Some(me.as_str()),
            (None, Some(author)) => message.nonce.is_some() && !author.bot,
            (None, None) => false,
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Wait for `token`'s reply, parse it as `family` and forget the token.
    pub async fn await_reply(
        &self,
        token: &str,
        family: CommandFamily,
        ctx: &ExtractContext,
        timeout: Duration,
    ) -> Result<CommandResult> {
        let bucket = match self.cache.wait(token, timeout).await {
            Ok(bucket) => bucket,
            Err(e) => {
                let event = match &e {
                    DankError::Timeout { waited, .. } => CommandEvent::TimedOut {
                        waited_ms: waited.as_millis() as u64,
                    },
                    other => CommandEvent::Failed {
                        error: other.to_string(),
                    },
                };
                CommandEventLogger::log_event(token, event);
                return Err(e);
            }
        };
        CommandEventLogger::log_event(
            token,
            CommandEvent::Resolved {
                messages: bucket.messages.len(),
                updates: bucket.updates.len(),
            },
        );

        let parsed = match bucket.reply_text() {
            Some(text) => self.parser.parse(family, text, ctx),
            None => {
                debug!(token, "[Dispatcher] Reply carried no text");
                Ok(CommandResult::miss())
            }
        };
        self.cache.clear(token).await;

        let event = match &parsed {
            Ok(result) => CommandEvent::Parsed {
                family: family.to_string(),
                success: result.success,
                on_cooldown: result.is_cooldown(),
                summary: result.to_string(),
            },
            Err(e) => CommandEvent::Failed {
                error: e.to_string(),
            },
        };
        CommandEventLogger::log_event(token, event);
        parsed
    }

    /// Issue one command and wait for its parsed outcome.
    pub async fn execute(
        &self,
        transport: &dyn CommandTransport,
        request: CommandRequest,
    ) -> Result<CommandResult> {
        let family = request
            .family
            .ok_or_else(|| DankError::UnknownFamily("<none>".into()))?;
        if family.needs_trade() && request.context.trade.is_none() {
            return Err(DankError::MissingTradeContext(family.to_string()));
        }

        let command = OutgoingCommand {
            nonce: self.nonces.next(),
            channel_id: self.config.channel_id,
            content: family.command_text(&self.config.command_prefix, &request.context),
            family,
        };
        self.cache
            .register_with(&command.nonce, policy_for(family))
            .await?;
        CommandEventLogger::log_event(
            &command.nonce,
            CommandEvent::Issued {
                family: family.to_string(),
                content: command.content.clone(),
            },
        );

        if let Err(e) = transport.send_command(&command).await {
            self.cache.clear(&command.nonce).await;
            let err = DankError::Transport(e.to_string());
            CommandEventLogger::log_event(
                &command.nonce,
                CommandEvent::Failed {
                    error: err.to_string(),
                },
            );
            return Err(err);
        }

        self.await_reply(&command.nonce, family, &request.context, self.config.reply_timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dankcord_core::{Author, Embed, FixedClock, Ledger, MessageReference};
    use serde_json::json;
    use tokio::sync::mpsc;

    const CHANNEL: u64 = 42;

    struct ChannelTransport {
        tx: mpsc::UnboundedSender<OutgoingCommand>,
    }

    #[async_trait]
    impl CommandTransport for ChannelTransport {
        async fn send_command(&self, command: &OutgoingCommand) -> anyhow::Result<()> {
            self.tx.send(command.clone())?;
            Ok(())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl CommandTransport for FailingTransport {
        async fn send_command(&self, _: &OutgoingCommand) -> anyhow::Result<()> {
            anyhow::bail!("HTTP 401 Unauthorized")
        }
    }

    fn dispatcher(timeout: Duration) -> Arc<Dispatcher> {
        let parser = ReplyParser::with_clock(Arc::new(FixedClock::at_secs(1_699_999_990)));
        Arc::new(Dispatcher::new(
            Arc::new(CorrelationCache::new()),
            Arc::new(parser),
            DispatcherConfig {
                channel_id: CHANNEL,
                reply_timeout: timeout,
                ..Default::default()
            },
        ))
    }

    fn echo(nonce: &str, id: &str, content: &str) -> GatewayEvent {
        GatewayEvent::MessageCreate(MessagePayload {
            id: id.into(),
            channel_id: CHANNEL.to_string(),
            content: content.into(),
            nonce: Some(nonce.into()),
            author: Some(Author {
                id: "100".into(),
                bot: false,
            }),
            ..Default::default()
        })
    }

    fn bot_reply(id: &str, reply_to: &str, description: &str) -> GatewayEvent {
        GatewayEvent::MessageCreate(MessagePayload {
            id: id.into(),
            channel_id: CHANNEL.to_string(),
            embeds: vec![Embed {
                title: None,
                description: Some(description.into()),
            }],
            author: Some(Author {
                id: "270904126974590976".into(),
                bot: true,
            }),
            message_reference: Some(MessageReference {
                message_id: Some(reply_to.into()),
            }),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_execute_beg_via_text_reply() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let issuer = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .execute(&ChannelTransport { tx }, CommandRequest::new(CommandFamily::Beg))
                    .await
            })
        };

        let sent = rx.recv().await.unwrap();
        assert_eq!(sent.content, "pls beg");
        assert_eq!(sent.channel_id, CHANNEL);

        assert!(dispatcher.route(echo(&sent.nonce, "m1", "pls beg")).await);
        assert!(!dispatcher.cache().is_resolved(&sent.nonce).await);
        assert!(
            dispatcher
                .route(bot_reply("m2", "m1", "You went out to beg and got **⏣ 150**!"))
                .await
        );

        let result = issuer.await.unwrap().unwrap();
        assert!(result.success);
        assert_eq!(result.gain, Ledger::coins(150));
        assert_eq!(dispatcher.cache().pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_edited_reply_waits_for_update() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let issuer = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .execute(&ChannelTransport { tx }, CommandRequest::new(CommandFamily::Crime))
                    .await
            })
        };
        let sent = rx.recv().await.unwrap();

        dispatcher.route(echo(&sent.nonce, "m1", "pls crime")).await;
        dispatcher
            .route(bot_reply("m2", "m1", "What crime do you want to commit?"))
            .await;
        assert!(!dispatcher.cache().is_resolved(&sent.nonce).await);

        let update = json!({
            "id": "m2",
            "embeds": [{"description": "You committed tax evasion and found <a:coin:123> **Useless Trash**"}]
        });
        assert!(dispatcher.route(GatewayEvent::MessageUpdate(update)).await);

        let result = issuer.await.unwrap().unwrap();
        assert_eq!(result.gain, Ledger::item(1, "Useless Trash"));
    }

    #[tokio::test]
    async fn test_cooldown_resolves_edit_family_without_update() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        let cache = dispatcher.cache().clone();
        cache
            .register_with("n1", policy_for(CommandFamily::Search))
            .await
            .unwrap();
        dispatcher.route(echo("n1", "m1", "pls search")).await;
        dispatcher
            .route(bot_reply(
                "m2",
                "m1",
                "This command is on cooldown, your cooldown is <t:1700000000:R> seconds.",
            ))
            .await;

        let result = dispatcher
            .await_reply("n1", CommandFamily::Search, &ExtractContext::default(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.is_cooldown());
        assert_eq!(result, CommandResult::cooldown(10.0));
    }

    #[tokio::test]
    async fn test_trade_identity_flows_from_request() {
        let dispatcher = dispatcher(Duration::from_secs(5));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let issuer = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .execute(
                        &ChannelTransport { tx },
                        CommandRequest::trade(CommandFamily::Sell, "fishing rod", 2),
                    )
                    .await
            })
        };
        let sent = rx.recv().await.unwrap();
        assert_eq!(sent.content, "pls sell fishing rod 2");

        dispatcher.route(echo(&sent.nonce, "m1", &sent.content)).await;
        dispatcher
            .route(bot_reply("m2", "m1", "You sold your items and got paid **⏣ 45,000**"))
            .await;

        let result = issuer.await.unwrap().unwrap();
        assert_eq!(result.gain, Ledger::coins(45000));
        assert_eq!(result.loss, Ledger::item(2, "fishing rod"));
    }

    #[tokio::test]
    async fn test_execute_rejects_incomplete_requests() {
        let dispatcher = dispatcher(Duration::from_secs(1));
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = ChannelTransport { tx };

        let err = dispatcher
            .execute(&transport, CommandRequest::new(CommandFamily::Buy))
            .await
            .unwrap_err();
        assert!(matches!(err, DankError::MissingTradeContext(f) if f == "buy"));

        let err = dispatcher
            .execute(&transport, CommandRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DankError::UnknownFamily(_)));
        assert_eq!(dispatcher.cache().pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_clears_entry() {
        let dispatcher = dispatcher(Duration::from_secs(1));
        let err = dispatcher
            .execute(&FailingTransport, CommandRequest::new(CommandFamily::Fish))
            .await
            .unwrap_err();
        assert!(matches!(err, DankError::Transport(ref msg) if msg.contains("401")));
        assert!(err.is_retryable());
        assert_eq!(dispatcher.cache().pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let dispatcher = dispatcher(Duration::from_millis(50));
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = dispatcher
            .execute(&ChannelTransport { tx }, CommandRequest::new(CommandFamily::Hunt))
            .await
            .unwrap_err();
        assert!(matches!(err, DankError::Timeout { .. }));
        assert_eq!(dispatcher.cache().pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_interaction_events_link_their_id() {
        let dispatcher = dispatcher(Duration::from_secs(1));
        let cache = dispatcher.cache().clone();
        cache.register("n1").await.unwrap();

        let ack = GatewayEvent::InteractionCreate {
            interaction_id: "i1".into(),
            nonce: Some("n1".into()),
        };
        assert!(dispatcher.route(ack).await);
        assert_eq!(cache.lookup("i1").await.as_deref(), Some("n1"));

        // A success without a nonce still finds its token through the link.
        let success = GatewayEvent::InteractionSuccess {
            interaction_id: "i1".into(),
            nonce: None,
        };
        assert!(dispatcher.route(success).await);
        assert!(cache.resolve("n1").await.unwrap().interaction_succeeded);
    }

    #[tokio::test]
    async fn test_foreign_events_are_dropped() {
        let dispatcher = dispatcher(Duration::from_secs(1));
        dispatcher.cache().register("n1").await.unwrap();

        let mut elsewhere = bot_reply("m9", "m1", "hello");
        if let GatewayEvent::MessageCreate(message) = &mut elsewhere {
            message.channel_id = "7".into();
            message.nonce = Some("n1".into());
        }
        assert!(!dispatcher.route(elsewhere).await);
        assert!(!dispatcher.route(bot_reply("m3", "unknown", "hi")).await);
        assert!(
            !dispatcher
                .route(GatewayEvent::MessageUpdate(json!({"id": "nope", "content": "x"})))
                .await
        );
        // The update is still kept in the shared scratch list.
        assert_eq!(dispatcher.cache().recent_updates().await.len(), 1);
        assert!(!dispatcher.cache().is_resolved("n1").await);
    }

    #[tokio::test]
    async fn test_configured_self_id_detects_echo() {
        let dispatcher = Dispatcher::new(
            Arc::new(CorrelationCache::new()),
            Arc::new(ReplyParser::new()),
            DispatcherConfig {
                self_user_id: Some("555".into()),
                ..Default::default()
            },
        );
        dispatcher.cache().register("n1").await.unwrap();

        let mut mine = echo("n1", "m1", "pls beg");
        if let GatewayEvent::MessageCreate(message) = &mut mine {
            message.author = Some(Author {
                id: "555".into(),
                bot: false,
            });
        }
        assert!(dispatcher.route(mine).await);
        assert!(!dispatcher.cache().is_resolved("n1").await);

        // Another user's message with our nonce counts as a reply.
        assert!(dispatcher.route(echo("n1", "m2", "hi")).await);
        assert!(dispatcher.cache().is_resolved("n1").await);
    }

    #[tokio::test]
    async fn test_run_preserves_order() {
        let dispatcher = dispatcher(Duration::from_secs(1));
        let cache = dispatcher.cache().clone();
        cache
            .register_with("n1", policy_for(CommandFamily::PostMemes))
            .await
            .unwrap();

        let events = vec![
            echo("n1", "m1", "pls pm"),
            bot_reply("m2", "m1", "Pick a meme type"),
            GatewayEvent::MessageUpdate(json!({"id": "m2", "content": "first edit"})),
            GatewayEvent::MessageUpdate(json!({"id": "m2", "content": "second edit"})),
        ];
        dispatcher.run(tokio_stream::iter(events)).await;

        let bucket = cache.resolve("n1").await.unwrap();
        assert_eq!(bucket.updates.len(), 2);
        assert_eq!(bucket.reply_text(), Some("second edit"));
    }
}
