/// Outgoing command detection: recognize `pls <family> [args]` or `/family`
/// text so an issuer can recover the family and trade context of a command.
use crate::types::{CommandFamily, CommandInvocation, ExtractContext, Trade};

/// Returns `None` for text that is not an economy command.
pub fn detect_family(text: &str, prefix: &str) -> Option<CommandInvocation> {
    let trimmed = text.trim();
    let body = strip_prefix_ci(trimmed, prefix)
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .or_else(|| trimmed.strip_prefix('/'))?
        .trim();

    let (alias, rest) = body
        .split_once(char::is_whitespace)
        .map(|(a, r)| (a, r.trim()))
        .unwrap_or((body, ""));
    let family = CommandFamily::from_alias(alias)?;

    let args: Vec<String> = rest.split_whitespace().map(String::from).collect();
    let context = if family.needs_trade() {
        trade_from_args(&args).map_or_else(ExtractContext::default, |trade| ExtractContext {
            trade: Some(trade),
        })
    } else {
        ExtractContext::default()
    };

    Some(CommandInvocation {
        family,
        raw_alias: alias.to_string(),
        args,
        context,
    })
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

/// `apple 3` → (apple, 3); `fishing rod` → (fishing rod, 1).
fn trade_from_args(args: &[String]) -> Option<Trade> {
    let (last, head) = args.split_last()?;
    match last.parse::<u64>() {
        Ok(quantity) if !head.is_empty() => Some(Trade::new(head.join(" "), quantity)),
        Ok(_) => None,
        Err(_) => Some(Trade::new(args.join(" "), 1)),
    }
}
