//! Markup grammars shared by the family extractors.
//!
//! All patterns are leftmost-first: the first match of a pattern wins and no
//! extractor re-interprets a field once it has been read.

use once_cell::sync::Lazy;
use regex::Regex;

/// Currency glyph used by the bot in front of coin amounts.
pub const COIN_GLYPH: char = '⏣';

/// `**⏣ 1234**`
static COIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*⏣ ([0-9]+)\*\*").unwrap());

/// `**anything**`, shortest span.
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());

/// `<:name:id>` or `<a:name:id>` plus trailing whitespace.
static EMOJI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<a?:[A-Za-z0-9_~\-]+:[0-9]+>\s*").unwrap());

/// `**3x <:Rock:1> Rock**` inside a search reply.
static FOUND_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([0-9]+)x (.+?)\*\*").unwrap());

/// Leading count in front of an item name, `1 ` or `1x `.
static LEADING_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+x?\s+").unwrap());

/// `12x` quantity token.
static QUANTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)x").unwrap());

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

/// `you died ... lost **⏣ N**`: the player's own death, bound to what it cost.
static DEATH_LOSS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\byou died\b.*?\blost\s+\*\*⏣ ([0-9]+)\*\*").unwrap()
});

/// Drop thousands separators so numbers match as one run of digits.
pub fn normalize(text: &str) -> String {
    text.replace(',', "")
}

/// Coins from the first `**⏣ N**` span. An amount too large for `u64`
/// saturates, so a matched span always counts as coins.
pub fn coin_amount(text: &str) -> Option<u64> {
    COIN_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| saturating_amount(m.as_str()))
}

fn saturating_amount(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

/// Inner text of every bold span, in order.
pub fn bold_spans(text: &str) -> Vec<&str> {
    BOLD_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Quantity and raw name of the first `**Nx name**` span.
pub fn found_item(text: &str) -> Option<(u64, &str)> {
    let caps = FOUND_ITEM_RE.captures(text)?;
    let quantity = caps.get(1)?.as_str().parse().ok()?;
    Some((quantity, caps.get(2)?.as_str()))
}

/// Remove custom-emoji tags so their raw ids never leak into item names.
pub fn strip_emoji(text: &str) -> String {
    EMOJI_RE.replace_all(text, "").trim().to_string()
}

pub fn contains_emoji(text: &str) -> bool {
    EMOJI_RE.is_match(text)
}

/// Item name from a bold span with emoji tags removed. Empty names are
/// rejected.
pub fn item_name(span: &str) -> Option<String> {
    let name = strip_emoji(span);
    (!name.is_empty()).then_some(name)
}

/// Item name of a gathering reply, where the span opens with the count
/// brought back (`1 ` or `1x `).
pub fn gathered_item_name(span: &str) -> Option<String> {
    let stripped = strip_emoji(span);
    let name = LEADING_COUNT_RE.replace(&stripped, "").trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Pick the bold span holding the item.
///
/// The coin amount is itself bold, so when coins were found the first span is
/// the coin amount and the item is the second one; otherwise the item is the
/// first span. Replies in the beg and crime families depend on this order.
pub fn item_span<'a>(spans: &[&'a str], coins_found: bool) -> Option<&'a str> {
    let index = if coins_found { 1 } else { 0 };
    spans.get(index).copied()
}

/// First `Nx` quantity token and the byte offset just past it.
pub fn quantity_token(text: &str) -> Option<(u64, usize)> {
    let caps = QUANTITY_RE.captures(text)?;
    let whole = caps.get(0)?;
    let quantity = caps.get(1)?.as_str().parse().ok()?;
    Some((quantity, whole.end()))
}

pub fn first_number(text: &str) -> Option<u64> {
    NUMBER_RE.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Coins lost to the player's death, when the reply says so explicitly.
pub fn death_loss(text: &str) -> Option<u64> {
    DEATH_LOSS_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| saturating_amount(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_amount_needs_glyph_inside_bold() {
        assert_eq!(coin_amount("got **⏣ 1500** today"), Some(1500));
        assert_eq!(coin_amount("got ⏣ 1500 today"), None);
        assert_eq!(coin_amount("got **1500** today"), None);
        // Separators must be normalized away first.
        assert_eq!(coin_amount("**⏣ 1,500**"), None);
        assert_eq!(coin_amount(&normalize("**⏣ 1,500**")), Some(1500));
    }

    #[test]
    fn test_bold_spans_are_shortest() {
        assert_eq!(bold_spans("**a** and **b c**"), vec!["a", "b c"]);
        assert!(bold_spans("no markup").is_empty());
    }

    #[test]
    fn test_item_span_positional_rule() {
        let spans = ["⏣ 40", "Cell Phone"];
        assert_eq!(item_span(&spans, true), Some("Cell Phone"));
        assert_eq!(item_span(&spans, false), Some("⏣ 40"));
        assert_eq!(item_span(&spans[..1], true), None);
        assert_eq!(item_span(&[], false), None);
    }

    #[test]
    fn test_strip_emoji_variants() {
        assert_eq!(strip_emoji("<:Trash:8619> Useless Trash"), "Useless Trash");
        assert_eq!(strip_emoji("<a:coin:123> Shiny"), "Shiny");
        assert_eq!(strip_emoji("Plain"), "Plain");
        assert!(contains_emoji("x <a:coin:123>"));
        assert!(!contains_emoji("<t:1700000000:R>"));
    }

    #[test]
    fn test_item_name_keeps_leading_digits() {
        assert_eq!(item_name("<:Hat:3> 10 Gallon Hat").as_deref(), Some("10 Gallon Hat"));
        assert_eq!(item_name("<:Fish:9>"), None);
    }

    #[test]
    fn test_gathered_item_name_drops_leading_count() {
        assert_eq!(
            gathered_item_name("1 <:Fish:9> Common Fish").as_deref(),
            Some("Common Fish")
        );
        assert_eq!(gathered_item_name("2x Worm").as_deref(), Some("Worm"));
        assert_eq!(gathered_item_name("<:Fish:9>"), None);
    }

    #[test]
    fn test_coin_amount_saturates() {
        assert_eq!(coin_amount("**⏣ 99999999999999999999999**"), Some(u64::MAX));
    }

    #[test]
    fn test_found_item_and_quantity_token() {
        assert_eq!(found_item("**3x <:Rock:1> Rock**"), Some((3, "<:Rock:1> Rock")));
        assert_eq!(found_item("**Rock**"), None);
        assert_eq!(quantity_token("- `12x` Meme"), Some((12, 6)));
        assert_eq!(first_number("⏣ 77 coins"), Some(77));
    }

    #[test]
    fn test_death_loss_needs_own_death_and_amount() {
        assert_eq!(death_loss("The cops shot you and You DIED. You lost **⏣ 4000**"), Some(4000));
        assert_eq!(death_loss("You died.\nYou lost **⏣ 12** coins"), Some(12));
        assert_eq!(death_loss("An old man died here and you found **⏣ 500**"), None);
        assert_eq!(death_loss("You died of embarrassment"), None);
        assert_eq!(death_loss("You lost **⏣ 20** but nobody died"), None);
    }
}
