/// Economy command families and the context their grammars need.
use std::fmt;
use std::str::FromStr;

use dankcord_core::DankError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Family
// ---------------------------------------------------------------------------

/// One economy command family. Families sharing a grammar (dig, fish, hunt)
/// stay distinct so callers can still tell the replies apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandFamily {
    Beg,
    Search,
    Dig,
    Fish,
    Hunt,
    Crime,
    PostMemes,
    Buy,
    Sell,
}

impl CommandFamily {
    pub const ALL: [CommandFamily; 9] = [
        Self::Beg,
        Self::Search,
        Self::Dig,
        Self::Fish,
        Self::Hunt,
        Self::Crime,
        Self::PostMemes,
        Self::Buy,
        Self::Sell,
    ];

    /// Canonical command name as typed after the prefix.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Beg => "beg",
            Self::Search => "search",
            Self::Dig => "dig",
            Self::Fish => "fish",
            Self::Hunt => "hunt",
            Self::Crime => "crime",
            Self::PostMemes => "postmemes",
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// Accepted spellings, canonical key first.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Beg => &["beg"],
            Self::Search => &["search"],
            Self::Dig => &["dig"],
            Self::Fish => &["fish"],
            Self::Hunt => &["hunt"],
            Self::Crime => &["crime"],
            Self::PostMemes => &["postmemes", "postmeme", "pm"],
            Self::Buy => &["buy"],
            Self::Sell => &["sell"],
        }
    }

    pub fn from_alias(alias: &str) -> Option<Self> {
        let lower = alias.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.aliases().iter().any(|a| *a == lower))
    }

    /// Buy and sell replies do not name the item unambiguously, so the
    /// caller must supply it.
    pub fn needs_trade(&self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }

    /// Families answered with a button prompt that is later edited into the
    /// actual outcome.
    pub fn edits_reply(&self) -> bool {
        matches!(self, Self::Search | Self::Crime | Self::PostMemes)
    }

    /// Render the outgoing text command, e.g. `pls buy apple 3`.
    pub fn command_text(&self, prefix: &str, ctx: &ExtractContext) -> String {
        match (&ctx.trade, self.needs_trade()) {
            (Some(trade), true) => {
                format!("{prefix} {} {} {}", self.key(), trade.item, trade.quantity)
            }
            _ => format!("{prefix} {}", self.key()),
        }
    }
}

impl fmt::Display for CommandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CommandFamily {
    type Err = DankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| DankError::UnknownFamily(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Item and quantity the issuer asked to buy or sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub item: String,
    pub quantity: u64,
}

impl Trade {
    pub fn new(item: impl Into<String>, quantity: u64) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

/// Family-specific knowledge the issuer already has about its own request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractContext {
    pub trade: Option<Trade>,
}

impl ExtractContext {
    pub fn trade(item: impl Into<String>, quantity: u64) -> Self {
        Self {
            trade: Some(Trade::new(item, quantity)),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed invocation
// ---------------------------------------------------------------------------

/// An outgoing text command recognized by `detect_family`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub family: CommandFamily,
    pub raw_alias: String,
    pub args: Vec<String>,
    pub context: ExtractContext,
}
