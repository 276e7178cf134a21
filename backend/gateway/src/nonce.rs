//! Snowflake-shaped nonces for outgoing commands.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// 2015-01-01T00:00:00Z, the first second of Discord's snowflake clock.
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Low 22 bits hold the per-process counter.
const COUNTER_BITS: u32 = 22;
const COUNTER_MASK: u64 = (1 << COUNTER_BITS) - 1;

/// Produces nonces shaped like Discord snowflakes: milliseconds since the
/// Discord epoch in the high bits, a wrapping counter in the low 22 bits.
#[derive(Debug, Default)]
pub struct NonceGenerator {
    counter: AtomicU64,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        self.next_at(Utc::now().timestamp_millis()).to_string()
    }

    fn next_at(&self, unix_ms: i64) -> u64 {
        let since_epoch = unix_ms.saturating_sub(DISCORD_EPOCH_MS).max(0) as u64;
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        (since_epoch << COUNTER_BITS) | seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_snowflake_layout() {
        let gen = NonceGenerator::new();
        let first = gen.next_at(DISCORD_EPOCH_MS + 1000);
        assert_eq!(first >> COUNTER_BITS, 1000);
        assert_eq!(first & COUNTER_MASK, 0);
        assert_eq!(gen.next_at(DISCORD_EPOCH_MS + 1000) & COUNTER_MASK, 1);
    }

    #[test]
    fn test_nonces_are_numeric_and_unique() {
        let gen = NonceGenerator::new();
        let nonces: HashSet<String> = (0..10_000).map(|_| gen.next()).collect();
        assert_eq!(nonces.len(), 10_000);
        assert!(nonces.iter().all(|n| n.parse::<u64>().is_ok()));
    }

    #[test]
    fn test_unique_across_threads() {
        let gen = Arc::new(NonceGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gen = gen.clone();
                std::thread::spawn(move || (0..1000).map(|_| gen.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all = HashSet::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        assert_eq!(all.len(), 4000);
    }
}
