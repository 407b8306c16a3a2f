//! Connection generations.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A generation number captured by a connection attempt when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
    /// The raw generation number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic generation counter for one subscription session.
///
/// Every restart bumps the counter. Events carrying an older epoch belong
/// to a connection that has been replaced and must be dropped without
/// touching session state.
#[derive(Debug, Default)]
pub struct EpochGuard {
    current: AtomicU64,
}

impl EpochGuard {
    /// Create a guard at epoch zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to a new generation and return it.
    pub fn bump(&self) -> Epoch {
        Epoch(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// The current generation.
    pub fn current(&self) -> Epoch {
        Epoch(self.current.load(Ordering::Acquire))
    }

    /// Whether `epoch` is still the current generation.
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current() == epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_invalidates_previous() {
        let guard = EpochGuard::new();
        let first = guard.bump();
        assert!(guard.is_current(first));

        let second = guard.bump();
        assert!(second > first);
        assert!(!guard.is_current(first));
        assert!(guard.is_current(second));
    }

    #[test]
    fn test_current_without_bump() {
        let guard = EpochGuard::new();
        assert_eq!(guard.current().get(), 0);
        assert_eq!(guard.current(), guard.current());
    }
}
