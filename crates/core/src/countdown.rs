//! Per-module exam countdown.
//!
//! A `Countdown` only counts; it does not schedule itself. The owner calls
//! [`Countdown::tick`] once per elapsed second and reacts to the returned
//! [`TickEvent`].

/// What happened during a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// The countdown is stopped or already expired; nothing changed.
    Idle,
    /// One second elapsed.
    Running,
    /// One second elapsed and the hidden timer was forced visible.
    Revealed,
    /// The countdown reached zero on this tick and stopped.
    Expired,
}

/// Countdown for the active module, including the timer visibility rule.
///
/// Visibility: the timer starts visible. If the user hides it and the remaining
/// time then crosses `warning_threshold` while hidden, the timer is forced
/// visible. That reveal happens at most once per countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    warning_threshold: u32,
    running: bool,
    visible: bool,
    revealed_once: bool,
}

impl Countdown {
    #[must_use]
    pub fn new(duration_secs: u32, warning_threshold: u32) -> Self {
        Self {
            remaining: duration_secs,
            warning_threshold,
            running: false,
            visible: true,
            revealed_once: false,
        }
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// True once the remaining time is at or under the warning threshold.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.remaining <= self.warning_threshold
    }

    /// Begin counting. A countdown that already hit zero stays stopped.
    pub fn start(&mut self) {
        self.running = self.remaining > 0;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Flip visibility at the user's request. Returns the new value.
    pub fn toggle_visibility(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> TickEvent {
        if !self.running {
            return TickEvent::Idle;
        }

        let before = self.remaining;
        self.remaining = before.saturating_sub(1);

        if self.remaining == 0 {
            self.running = false;
            return TickEvent::Expired;
        }

        let crossed = before > self.warning_threshold && self.remaining <= self.warning_threshold;
        if crossed && !self.visible && !self.revealed_once {
            self.visible = true;
            self.revealed_once = true;
            return TickEvent::Revealed;
        }

        TickEvent::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(duration: u32, threshold: u32) -> Countdown {
        let mut c = Countdown::new(duration, threshold);
        c.start();
        c
    }

    #[test]
    fn idle_until_started() {
        let mut c = Countdown::new(10, 3);
        assert_eq!(c.tick(), TickEvent::Idle);
        assert_eq!(c.remaining_secs(), 10);
    }

    #[test]
    fn each_tick_decrements_by_one_floored_at_zero() {
        let mut c = running(3, 1);
        let mut previous = c.remaining_secs();
        for _ in 0..5 {
            c.tick();
            assert_eq!(c.remaining_secs(), previous.saturating_sub(1));
            previous = c.remaining_secs();
        }
        assert_eq!(c.remaining_secs(), 0);
    }

    #[test]
    fn expires_on_the_tick_that_reaches_zero() {
        let mut c = running(5, 1);
        let events: Vec<_> = (0..6).map(|_| c.tick()).collect();
        assert_eq!(&events[..4], &[TickEvent::Running; 4]);
        assert_eq!(events[4], TickEvent::Expired);
        assert_eq!(events[5], TickEvent::Idle);
        assert!(!c.is_running());
        assert!(c.is_expired());
    }

    #[test]
    fn zero_duration_never_runs() {
        let mut c = running(0, 0);
        assert!(!c.is_running());
        assert_eq!(c.tick(), TickEvent::Idle);
    }

    #[test]
    fn hidden_timer_is_revealed_once_at_threshold() {
        let mut c = running(400, 300);
        assert!(!c.toggle_visibility());

        let mut reveals = 0;
        while c.remaining_secs() > 300 {
            if c.tick() == TickEvent::Revealed {
                reveals += 1;
                assert_eq!(c.remaining_secs(), 300);
            }
        }
        assert_eq!(reveals, 1);
        assert!(c.is_visible());
        assert!(c.is_warning());

        // Hiding again is allowed and stays hidden.
        assert!(!c.toggle_visibility());
        while c.tick() != TickEvent::Expired {}
        assert!(!c.is_visible());
    }

    #[test]
    fn visible_timer_consumes_no_reveal() {
        let mut c = running(302, 300);
        assert_eq!(c.tick(), TickEvent::Running);
        assert_eq!(c.tick(), TickEvent::Running);
        assert!(c.is_visible());
    }

    #[test]
    fn hiding_after_threshold_is_not_revealed() {
        let mut c = running(250, 300);
        c.toggle_visibility();
        for _ in 0..10 {
            assert_eq!(c.tick(), TickEvent::Running);
        }
        assert!(!c.is_visible());
    }
}
