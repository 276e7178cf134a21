/// Per-family reply grammars.
///
/// Each extractor is a pure function of the reply text. A reply that does not
/// carry the family's primary signal yields `CommandResult::miss()`; only a
/// missing trade context for buy/sell is an error.
use dankcord_core::{CommandResult, DankError, Ledger, Result};
use tracing::debug;

use crate::grammar::{
    bold_spans, coin_amount, contains_emoji, death_loss, first_number, found_item,
    gathered_item_name, item_name, item_span, normalize, quantity_token, strip_emoji, COIN_GLYPH,
};
use crate::types::{ExtractContext, Trade};

/// Line that opens the reward list of a postmemes reply.
pub const RECEIVED_MARKER: &str = "**You Received:**";

/// Leading lines of a postmemes reply that describe the meme, not the outcome.
const POSTMEMES_PREAMBLE_LINES: usize = 3;

// ---------------------------------------------------------------------------
// beg / crime
// ---------------------------------------------------------------------------

/// Without a coin amount, an emoji-tagged item span is not trusted and the
/// reply is reported as a miss.
pub fn beg(text: &str) -> CommandResult {
    let normalized = normalize(text);
    if coin_amount(&normalized).is_none()
        && item_span(&bold_spans(&normalized), false).is_some_and(contains_emoji)
    {
        debug!("Beg reply with an emoji item and no coins");
        return CommandResult::miss();
    }
    coins_then_item(text)
}

pub fn crime(text: &str) -> CommandResult {
    died_or(text, coins_then_item)
}

/// Shared beg/crime grammar: a coin amount and at most one bold item.
fn coins_then_item(text: &str) -> CommandResult {
    let text = normalize(text);
    let coins = coin_amount(&text);
    let spans = bold_spans(&text);
    let item = item_span(&spans, coins.is_some()).and_then(item_name);

    let mut gain = Ledger {
        coins,
        items: Vec::new(),
    };
    if let Some(name) = item {
        gain = gain.with_item(1, name);
    }
    CommandResult::gained(gain)
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

pub fn search(text: &str) -> CommandResult {
    died_or(text, search_outcome)
}

fn search_outcome(text: &str) -> CommandResult {
    let text = normalize(text);
    let mut gain = Ledger {
        coins: coin_amount(&text),
        items: Vec::new(),
    };
    if let Some((quantity, raw_name)) = found_item(&text) {
        let name = strip_emoji(raw_name);
        if !name.is_empty() {
            gain = gain.with_item(quantity, name);
        }
    }
    CommandResult::gained(gain)
}

// ---------------------------------------------------------------------------
// dig / fish / hunt
// ---------------------------------------------------------------------------

/// Shared grammar of the gathering commands: the first bold span names the
/// single item brought back.
pub fn gather(text: &str) -> CommandResult {
    died_or(text, gather_outcome)
}

fn gather_outcome(text: &str) -> CommandResult {
    let text = normalize(text);
    match bold_spans(&text).first().copied().and_then(gathered_item_name) {
        Some(name) => CommandResult::gained(Ledger::item(1, name)),
        None => CommandResult::miss(),
    }
}

// ---------------------------------------------------------------------------
// postmemes
// ---------------------------------------------------------------------------

pub fn postmemes(text: &str) -> CommandResult {
    if !text.contains("**You Received") {
        return CommandResult::miss();
    }

    let text = normalize(text);
    let lines: Vec<&str> = text.split('\n').skip(POSTMEMES_PREAMBLE_LINES).collect();
    let start = lines
        .iter()
        .position(|line| line.trim() == RECEIVED_MARKER)
        .unwrap_or(0);

    let mut gain = Ledger::default();
    for line in &lines[start..] {
        if line.contains(COIN_GLYPH) {
            if let (None, Some(coins)) = (gain.coins, first_number(line)) {
                gain = gain.with_coins(coins);
            }
        } else if contains_emoji(line) {
            let Some((quantity, end)) = quantity_token(line) else {
                debug!(line = %line, "Reward line without a quantity");
                continue;
            };
            let name = strip_emoji(&line[end..]);
            let name = name.trim_matches(|c: char| c == '`' || c == '*' || c.is_whitespace());
            if !name.is_empty() {
                gain = gain.with_item(quantity, name);
            }
        }
    }
    CommandResult::gained(gain)
}

// ---------------------------------------------------------------------------
// buy / sell
// ---------------------------------------------------------------------------

/// Confirms a purchase and reads the price. The item is always the one the
/// caller asked for.
pub fn buy(text: &str, ctx: &ExtractContext) -> Result<CommandResult> {
    let trade = trade_of("buy", ctx)?;
    if !(text.contains("bought") && text.contains("and paid")) {
        return Ok(CommandResult::miss());
    }
    let text = normalize(text);
    let Some(paid) = bold_spans(&text).get(1).and_then(|span| first_number(span)) else {
        debug!("Purchase confirmed but no price span found");
        return Ok(CommandResult::miss());
    };
    Ok(CommandResult::from_ledgers(
        Ledger::item(trade.quantity, trade.item.clone()),
        Ledger::coins(paid),
    ))
}

/// Confirms a sale and reads the earnings.
pub fn sell(text: &str, ctx: &ExtractContext) -> Result<CommandResult> {
    let trade = trade_of("sell", ctx)?;
    if !(text.contains("sold") && text.contains("and got paid")) {
        return Ok(CommandResult::miss());
    }
    let text = normalize(text);
    let Some(earned) = bold_spans(&text).first().and_then(|span| first_number(span)) else {
        debug!("Sale confirmed but no earnings span found");
        return Ok(CommandResult::miss());
    };
    Ok(CommandResult::from_ledgers(
        Ledger::coins(earned),
        Ledger::item(trade.quantity, trade.item.clone()),
    ))
}

fn trade_of<'a>(family: &str, ctx: &'a ExtractContext) -> Result<&'a Trade> {
    ctx.trade
        .as_ref()
        .ok_or_else(|| DankError::MissingTradeContext(family.to_string()))
}

// ---------------------------------------------------------------------------
// death
// ---------------------------------------------------------------------------

/// The player's own death, stated together with the coins it cost, replaces
/// the family outcome. The loss is read from that statement.
fn died_or(text: &str, outcome: fn(&str) -> CommandResult) -> CommandResult {
    let Some(lost) = death_loss(&normalize(text)) else {
        return outcome(text);
    };
    CommandResult {
        success: false,
        loss: Ledger::coins(lost),
        ..CommandResult::miss().with_death(true)
    }
}
