//! `dankcord parse`: run one reply text through the family grammar.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use dankcord_commands::{CommandFamily, ExtractContext, ReplyParser};
use dankcord_core::{CommandResult, FixedClock};

#[derive(Debug, Clone)]
pub struct ParseArgs {
    pub family: CommandFamily,
    pub item: Option<String>,
    pub quantity: u64,
    /// Unix seconds used as "now" for cooldown math.
    pub now: Option<i64>,
    /// Reply text, or `-` to read stdin.
    pub text: String,
}

pub fn run(args: ParseArgs) -> Result<()> {
    let text = read_text(&args.text)?;
    let result = parse(&args, &text)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn parse(args: &ParseArgs, text: &str) -> Result<CommandResult> {
    let parser = match args.now {
        Some(secs) => {
            Utc.timestamp_opt(secs, 0)
                .single()
                .with_context(|| format!("--now {secs} is out of range"))?;
            ReplyParser::with_clock(Arc::new(FixedClock::at_secs(secs)))
        }
        None => ReplyParser::new(),
    };

    let ctx = match &args.item {
        Some(item) => ExtractContext::trade(item.clone(), args.quantity),
        None => ExtractContext::default(),
    };

    parser
        .parse(args.family, text, &ctx)
        .with_context(|| format!("Failed to parse {} reply", args.family))
}

fn read_text(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read reply text from stdin")?;
    Ok(buf)
}
