use std::fmt;

use serde::{Deserialize, Serialize};

/// A quantity of one named item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub quantity: u64,
    pub name: String,
}

impl ItemStack {
    pub fn new(quantity: u64, name: impl Into<String>) -> Self {
        Self {
            quantity,
            name: name.into(),
        }
    }
}

/// Resources gained or spent by one command.
///
/// Coins and items are independent: either, both or neither may be present.
/// Entries are facts about this reply, not deltas against a known balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coins: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemStack>,
}

impl Ledger {
    pub fn coins(amount: u64) -> Self {
        Self {
            coins: Some(amount),
            items: Vec::new(),
        }
    }

    pub fn item(quantity: u64, name: impl Into<String>) -> Self {
        Self {
            coins: None,
            items: vec![ItemStack::new(quantity, name)],
        }
    }

    pub fn with_coins(mut self, amount: u64) -> Self {
        self.coins = Some(amount);
        self
    }

    pub fn with_item(mut self, quantity: u64, name: impl Into<String>) -> Self {
        self.items.push(ItemStack::new(quantity, name));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_none() && self.items.is_empty()
    }
}

/// Structured outcome of one economy command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the attempted action meaningfully completed.
    pub success: bool,
    /// `None` when the reply says nothing about dying.
    pub death: Option<bool>,
    #[serde(default)]
    pub gain: Ledger,
    #[serde(default)]
    pub loss: Ledger,
    /// Seconds until the command may run again. Only set for cooldown notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<f64>,
}

impl CommandResult {
    /// Result built from whatever an extractor managed to find.
    /// Success follows from the presence of any gain or loss.
    pub fn from_ledgers(gain: Ledger, loss: Ledger) -> Self {
        Self {
            success: !gain.is_empty() || !loss.is_empty(),
            death: None,
            gain,
            loss,
            cooldown: None,
        }
    }

    pub fn gained(gain: Ledger) -> Self {
        Self::from_ledgers(gain, Ledger::default())
    }

    /// Text was not recognized, or the command failed in-game.
    pub fn miss() -> Self {
        Self::default()
    }

    /// A cooldown notice: never carries an outcome.
    /// The remaining time is clamped at zero and rounded to two decimals.
    pub fn cooldown(remaining_secs: f64) -> Self {
        let clamped = remaining_secs.max(0.0);
        Self {
            cooldown: Some((clamped * 100.0).round() / 100.0),
            ..Self::default()
        }
    }

    pub fn with_death(mut self, died: bool) -> Self {
        self.death = Some(died);
        self
    }

    pub fn is_cooldown(&self) -> bool {
        self.cooldown.is_some()
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(secs) = self.cooldown {
            return write!(f, "cooldown ({secs:.2}s)");
        }
        write!(f, "{}", if self.success { "success" } else { "miss" })?;
        if let Some(coins) = self.gain.coins {
            write!(f, " +{coins} coins")?;
        }
        for item in &self.gain.items {
            write!(f, " +{}x {}", item.quantity, item.name)?;
        }
        if let Some(coins) = self.loss.coins {
            write!(f, " -{coins} coins")?;
        }
        for item in &self.loss.items {
            write!(f, " -{}x {}", item.quantity, item.name)?;
        }
        if self.death == Some(true) {
            write!(f, " (died)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_rounding_and_invariant() {
        let result = CommandResult::cooldown(10.456);
        assert_eq!(result.cooldown, Some(10.46));
        assert!(!result.success);
        assert!(result.gain.is_empty());
        assert!(result.loss.is_empty());

        assert_eq!(CommandResult::cooldown(-3.0).cooldown, Some(0.0));
    }

    #[test]
    fn test_success_follows_ledgers() {
        assert!(CommandResult::gained(Ledger::coins(5)).success);
        assert!(!CommandResult::from_ledgers(Ledger::default(), Ledger::default()).success);
        assert!(CommandResult::from_ledgers(Ledger::default(), Ledger::coins(1)).success);
    }

    #[test]
    fn test_serialized_shape_omits_absent_parts() {
        let result = CommandResult::gained(Ledger::coins(150));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "death": null,
                "gain": {"coins": 150},
                "loss": {}
            })
        );
    }

    #[test]
    fn test_display() {
        let result = CommandResult::from_ledgers(
            Ledger::item(2, "Apple"),
            Ledger::coins(300),
        );
        assert_eq!(result.to_string(), "success +2x Apple -300 coins");
        assert_eq!(CommandResult::cooldown(4.0).to_string(), "cooldown (4.00s)");
    }
}
