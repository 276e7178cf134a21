//! `dankcord replay`: feed recorded gateway frames through the dispatcher and
//! print the outcome correlated to one nonce.
//!
//! Frames are read from a JSON Lines file, one raw dispatch frame per line.
//! Without an explicit family, the family and trade are read back from the
//! echoed command text carrying the nonce.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dankcord_commands::{
    detect_family, CommandFamily, CommandInvocation, ExtractContext, ReplyParser,
};
use dankcord_config::DankConfig;
use dankcord_core::{CommandResult, GatewayEvent};
use dankcord_gateway::{policy_for, CorrelationCache, Dispatcher, DispatcherConfig};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ReplayArgs {
    pub frames: PathBuf,
    pub nonce: String,
    /// Inferred from the echoed command when absent.
    pub family: Option<CommandFamily>,
    pub item: Option<String>,
    pub quantity: u64,
    /// How long to wait for resolution after the last frame.
    pub wait: Duration,
}

pub async fn run(args: ReplayArgs, config: Option<DankConfig>) -> Result<()> {
    let result = replay(&args, config.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn replay(args: &ReplayArgs, config: Option<&DankConfig>) -> Result<CommandResult> {
    let events = read_frames(&args.frames).await?;
    info!(frames = events.len(), nonce = %args.nonce, "Replaying gateway frames");

    let dispatcher_config = dispatcher_config(config);
    let (family, ctx) = resolve_command(args, &events, &dispatcher_config.command_prefix)?;

    let cache = Arc::new(CorrelationCache::new());
    let janitor = config.map(|c| {
        cache
            .clone()
            .spawn_janitor(c.janitor_interval(), c.stale_after())
    });
    let dispatcher = Dispatcher::new(
        cache.clone(),
        Arc::new(ReplyParser::new()),
        dispatcher_config,
    );

    cache
        .register_with(&args.nonce, policy_for(family))
        .await?;
    dispatcher.run(tokio_stream::iter(events)).await;

    let outcome = dispatcher
        .await_reply(&args.nonce, family, &ctx, args.wait)
        .await;

    if let Some(janitor) = janitor {
        janitor.abort();
    }
    outcome.with_context(|| format!("No usable reply for nonce {}", args.nonce))
}

/// Family and extraction context for the replayed nonce. An explicit family or
/// item wins over what the echoed command says.
fn resolve_command(
    args: &ReplayArgs,
    events: &[GatewayEvent],
    prefix: &str,
) -> Result<(CommandFamily, ExtractContext)> {
    let echoed = echoed_invocation(events, &args.nonce, prefix);
    let family = match (args.family, &echoed) {
        (Some(family), _) => family,
        (None, Some(invocation)) => {
            info!(
                family = %invocation.family,
                alias = %invocation.raw_alias,
                "Family read from echoed command"
            );
            invocation.family
        }
        (None, None) => bail!(
            "No --family given and no recognizable command echoed with nonce {}",
            args.nonce
        ),
    };

    let ctx = match &args.item {
        Some(item) => ExtractContext::trade(item.clone(), args.quantity),
        None => echoed
            .filter(|invocation| invocation.family == family)
            .map(|invocation| invocation.context)
            .unwrap_or_default(),
    };
    Ok((family, ctx))
}

fn echoed_invocation(
    events: &[GatewayEvent],
    nonce: &str,
    prefix: &str,
) -> Option<CommandInvocation> {
    events.iter().find_map(|event| match event {
        GatewayEvent::MessageCreate(message) if message.nonce.as_deref() == Some(nonce) => {
            detect_family(&message.content, prefix)
        }
        _ => None,
    })
}

fn dispatcher_config(config: Option<&DankConfig>) -> DispatcherConfig {
    match config {
        Some(c) => DispatcherConfig {
            channel_id: c.channel_id,
            command_prefix: c.command_prefix().to_string(),
            reply_timeout: c.reply_timeout(),
            self_user_id: c.self_user_id.clone(),
        },
        None => DispatcherConfig::default(),
    }
}

async fn read_frames(path: &Path) -> Result<Vec<GatewayEvent>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read frames file: {}", path.display()))?;

    let mut events = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(frame) => events.extend(GatewayEvent::from_frame(&frame)),
            Err(e) => warn!(line = i + 1, error = %e, "Skipping malformed frame"),
        }
    }
    Ok(events)
}
