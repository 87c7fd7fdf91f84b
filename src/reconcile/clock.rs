//! Time-source abstraction for duration calculations.
//!
//! Elapsed-time math needs a "now" reference. Threading it through a trait
//! keeps the reconciliation engine deterministic under test: production code
//! uses [`SystemClock`], tests supply a [`FixedClock`].

use chrono::Utc;

/// Source of the current instant, in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Returns the current instant as epoch milliseconds (UTC).
    fn now_ms(&self) -> i64;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Fixed time source for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_returns_its_instant() {
        let clock = FixedClock(1_704_103_500_000);
        assert_eq!(clock.now_ms(), 1_704_103_500_000);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // Any instant after 2020 is good enough to prove we are not at epoch 0.
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
