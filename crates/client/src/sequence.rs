//! Request sequencing for latest-wins fetches.
//!
//! Each fetch takes a [`Generation`] before it starts. Starting another
//! fetch, or invalidating the sequence, makes earlier generations stale, and
//! a stale generation's response is dropped instead of applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter shared by the fetches of one view.
#[derive(Debug, Clone, Default)]
pub struct RequestSequence {
    current: Arc<AtomicU64>,
}

/// Ticket issued by [`RequestSequence::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

impl RequestSequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new fetch, superseding every earlier one.
    pub fn begin(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `generation` is still the latest.
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current.load(Ordering::Acquire) == generation.0
    }

    /// Make every issued generation stale.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_generation_wins() {
        let sequence = RequestSequence::new();
        let first = sequence.begin();
        assert!(sequence.is_current(first));

        let second = sequence.begin();
        assert!(!sequence.is_current(first));
        assert!(sequence.is_current(second));
    }

    #[test]
    fn test_invalidate_and_clones_share_state() {
        let sequence = RequestSequence::new();
        let shared = sequence.clone();
        let generation = sequence.begin();

        shared.invalidate();
        assert!(!sequence.is_current(generation));
    }
}
