//! Bounded navigation inside the active module.

use chrono::{DateTime, Duration, Utc};

/// Tracks the current question index for the active module.
///
/// Every accepted index change opens a short transition window so the
/// presentation layer can avoid rendering content mid-swap. The index itself
/// is updated in a single assignment; concurrent requests resolve to the last
/// one applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    index: usize,
    count: usize,
    lock: Duration,
    locked_until: Option<DateTime<Utc>>,
}

impl Navigator {
    #[must_use]
    pub fn new(count: usize, lock: Duration) -> Self {
        Self {
            index: 0,
            count,
            lock,
            locked_until: None,
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of questions in the active module.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.count
    }

    /// Clamp `requested` to `[0, count - 1]`.
    #[must_use]
    pub fn clamp(&self, requested: i64) -> usize {
        let last = self.count.saturating_sub(1);
        if requested <= 0 {
            return 0;
        }
        usize::try_from(requested).map_or(last, |r| r.min(last))
    }

    /// Move to `requested` (clamped) and open the transition window.
    ///
    /// Returns the index actually applied.
    pub fn navigate_to(&mut self, requested: i64, now: DateTime<Utc>) -> usize {
        let target = self.clamp(requested);
        if target != self.index {
            self.index = target;
            self.locked_until = Some(now + self.lock);
        }
        self.index
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> usize {
        let requested = i64::try_from(self.index).unwrap_or(i64::MAX).saturating_add(1);
        self.navigate_to(requested, now)
    }

    pub fn previous(&mut self, now: DateTime<Utc>) -> usize {
        let requested = i64::try_from(self.index).unwrap_or(i64::MAX) - 1;
        self.navigate_to(requested, now)
    }

    /// True while content should not be rendered because of a recent index change.
    #[must_use]
    pub fn is_transitioning(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Point at the first question of a module with `count` questions.
    pub fn reset_for_module(&mut self, count: usize) {
        self.count = count;
        self.index = 0;
        self.locked_until = None;
    }
}
