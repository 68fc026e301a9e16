use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("module duration must be between 1 second and 24 hours")]
    InvalidModuleDuration,

    #[error("tick interval must be between 1 and 60000 ms")]
    InvalidTickInterval,

    #[error("transition lock must be at most 5000 ms")]
    InvalidTransitionLock,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Default module length: 64 minutes.
pub const DEFAULT_MODULE_SECS: u32 = 3_840;
/// Hidden timers are forced visible when this many seconds remain.
pub const DEFAULT_WARNING_SECS: u32 = 300;
pub const DEFAULT_TRANSITION_LOCK_MS: u32 = 150;
pub const DEFAULT_TICK_INTERVAL_MS: u32 = 1_000;

const MAX_MODULE_SECS: u32 = 86_400;

/// Tunables for a timed exam session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamSettings {
    module_duration_secs: u32,
    warning_threshold_secs: u32,
    transition_lock_ms: u32,
    tick_interval_ms: u32,
    review_editable: bool,
    clear_answer_on_eliminate: bool,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            module_duration_secs: DEFAULT_MODULE_SECS,
            warning_threshold_secs: DEFAULT_WARNING_SECS,
            transition_lock_ms: DEFAULT_TRANSITION_LOCK_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            review_editable: false,
            clear_answer_on_eliminate: false,
        }
    }
}

impl ExamSettings {
    /// Creates custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is out of range.
    pub fn new(
        module_duration_secs: u32,
        warning_threshold_secs: u32,
        transition_lock_ms: u32,
        tick_interval_ms: u32,
        review_editable: bool,
        clear_answer_on_eliminate: bool,
    ) -> Result<Self, SettingsError> {
        let settings = Self {
            module_duration_secs,
            warning_threshold_secs,
            transition_lock_ms,
            tick_interval_ms,
            review_editable,
            clear_answer_on_eliminate,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check ranges; useful after deserializing.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is out of range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(1..=MAX_MODULE_SECS).contains(&self.module_duration_secs) {
            return Err(SettingsError::InvalidModuleDuration);
        }
        if !(1..=60_000).contains(&self.tick_interval_ms) {
            return Err(SettingsError::InvalidTickInterval);
        }
        if self.transition_lock_ms > 5_000 {
            return Err(SettingsError::InvalidTransitionLock);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SettingsError::InvalidModuleDuration` when out of range.
    pub fn with_module_duration_secs(mut self, secs: u32) -> Result<Self, SettingsError> {
        self.module_duration_secs = secs;
        self.validate()?;
        Ok(self)
    }

    #[must_use]
    pub fn with_warning_threshold_secs(mut self, secs: u32) -> Self {
        self.warning_threshold_secs = secs;
        self
    }

    #[must_use]
    pub fn with_review_editable(mut self, editable: bool) -> Self {
        self.review_editable = editable;
        self
    }

    #[must_use]
    pub fn with_clear_answer_on_eliminate(mut self, enabled: bool) -> Self {
        self.clear_answer_on_eliminate = enabled;
        self
    }

    #[must_use]
    pub fn module_duration_secs(&self) -> u32 {
        self.module_duration_secs
    }

    #[must_use]
    pub fn warning_threshold_secs(&self) -> u32 {
        self.warning_threshold_secs
    }

    #[must_use]
    pub fn transition_lock_ms(&self) -> u32 {
        self.transition_lock_ms
    }

    #[must_use]
    pub fn tick_interval_ms(&self) -> u32 {
        self.tick_interval_ms
    }

    /// Whether answers may change again after reopening a submitted session for review.
    #[must_use]
    pub fn review_editable(&self) -> bool {
        self.review_editable
    }

    #[must_use]
    pub fn clear_answer_on_eliminate(&self) -> bool {
        self.clear_answer_on_eliminate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sixty_four_minute_module() {
        let s = ExamSettings::default();
        assert_eq!(s.module_duration_secs(), 3_840);
        assert_eq!(s.warning_threshold_secs(), 300);
        assert!(!s.review_editable());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_zero_duration() {
        let err = ExamSettings::default()
            .with_module_duration_secs(0)
            .unwrap_err();
        assert_eq!(err, SettingsError::InvalidModuleDuration);
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let err = ExamSettings::new(60, 10, 150, 0, false, false).unwrap_err();
        assert_eq!(err, SettingsError::InvalidTickInterval);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let s: ExamSettings =
            serde_json::from_str(r#"{"module_duration_secs": 1920, "review_editable": true}"#)
                .unwrap();
        assert_eq!(s.module_duration_secs(), 1_920);
        assert_eq!(s.warning_threshold_secs(), 300);
        assert!(s.review_editable());
    }
}
