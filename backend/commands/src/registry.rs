/// Extractor registry: command family → reply grammar.
///
/// Callers dispatch on `CommandFamily` instead of branching on command names.
use std::collections::HashMap;
use std::sync::Arc;

use dankcord_core::{Clock, CommandResult, DankError, Result, SystemClock};
use tracing::debug;

use crate::cooldown::{check_cooldown, parse_cooldown};
use crate::extractors;
use crate::types::{CommandFamily, ExtractContext};

/// A pure reply grammar.
pub type Extractor = fn(&str, &ExtractContext) -> Result<CommandResult>;

/// Built-in grammars for every family.
pub fn builtin_extractors() -> Vec<(CommandFamily, Extractor)> {
    vec![
        (CommandFamily::Beg, beg as Extractor),
        (CommandFamily::Search, search as Extractor),
        (CommandFamily::Dig, gather as Extractor),
        (CommandFamily::Fish, gather as Extractor),
        (CommandFamily::Hunt, gather as Extractor),
        (CommandFamily::Crime, crime as Extractor),
        (CommandFamily::PostMemes, postmemes as Extractor),
        (CommandFamily::Buy, extractors::buy as Extractor),
        (CommandFamily::Sell, extractors::sell as Extractor),
    ]
}

fn beg(text: &str, _: &ExtractContext) -> Result<CommandResult> {
    Ok(extractors::beg(text))
}

fn search(text: &str, _: &ExtractContext) -> Result<CommandResult> {
    Ok(extractors::search(text))
}

fn gather(text: &str, _: &ExtractContext) -> Result<CommandResult> {
    Ok(extractors::gather(text))
}

fn crime(text: &str, _: &ExtractContext) -> Result<CommandResult> {
    Ok(extractors::crime(text))
}

fn postmemes(text: &str, _: &ExtractContext) -> Result<CommandResult> {
    Ok(extractors::postmemes(text))
}

pub struct ReplyParser {
    extractors: HashMap<CommandFamily, Extractor>,
    clock: Arc<dyn Clock>,
}

impl ReplyParser {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Parser whose cooldown math reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            extractors: builtin_extractors().into_iter().collect(),
            clock,
        }
    }

    /// Register or replace the grammar for a family.
    pub fn register(&mut self, family: CommandFamily, extractor: Extractor) {
        self.extractors.insert(family, extractor);
    }

    pub fn extractor(&self, family: CommandFamily) -> Option<Extractor> {
        self.extractors.get(&family).copied()
    }

    /// Parse one reply. Cooldown notices short-circuit the family grammar.
    pub fn parse(
        &self,
        family: CommandFamily,
        text: &str,
        ctx: &ExtractContext,
    ) -> Result<CommandResult> {
        if check_cooldown(text) {
            let result = parse_cooldown(text, self.clock.now())?;
            debug!(%family, cooldown = ?result.cooldown, "[Parser] Cooldown notice");
            return Ok(result);
        }

        let extractor = self
            .extractor(family)
            .ok_or_else(|| DankError::UnknownFamily(family.to_string()))?;
        let result = extractor(text, ctx)?;
        debug!(%family, success = result.success, "[Parser] Extracted reply");
        Ok(result)
    }
}

impl Default for ReplyParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dankcord_core::{FixedClock, Ledger};

    #[test]
    fn test_every_family_has_a_grammar() {
        let parser = ReplyParser::new();
        for family in CommandFamily::ALL {
            assert!(parser.extractor(family).is_some(), "missing {family}");
        }
    }

    #[test]
    fn test_cooldown_runs_before_family_grammar() {
        let parser = ReplyParser::with_clock(Arc::new(FixedClock::at_secs(1_699_999_990)));
        let text = "This command is on cooldown, your cooldown is <t:1700000000:R> seconds. You got **⏣ 5**";
        let result = parser
            .parse(CommandFamily::Beg, text, &ExtractContext::default())
            .unwrap();
        assert_eq!(result, CommandResult::cooldown(10.0));
    }

    #[test]
    fn test_malformed_cooldown_surfaces() {
        let parser = ReplyParser::new();
        let text = "The command cooldown is 30 seconds";
        assert!(matches!(
            parser.parse(CommandFamily::Fish, text, &ExtractContext::default()),
            Err(DankError::MalformedCooldown(_))
        ));
    }

    #[test]
    fn test_register_overrides_builtin() {
        let mut parser = ReplyParser::new();
        parser.register(CommandFamily::Dig, |_, _| Ok(CommandResult::gained(Ledger::coins(1))));
        let result = parser
            .parse(CommandFamily::Dig, "anything", &ExtractContext::default())
            .unwrap();
        assert_eq!(result.gain, Ledger::coins(1));
    }

    #[test]
    fn test_dispatches_by_family() {
        let parser = ReplyParser::new();
        let ctx = ExtractContext::default();
        let text = "You went out to beg and got **⏣ 150**!";
        assert_eq!(
            parser.parse(CommandFamily::Beg, text, &ctx).unwrap().gain,
            Ledger::coins(150)
        );
        assert!(!parser.parse(CommandFamily::PostMemes, text, &ctx).unwrap().success);
    }
}
