use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Content has been requested but not yet delivered.
    Loading,
    /// No content exists for the requested test.
    Locked,
    NotStarted,
    InProgress,
    Submitted,
    /// Browsing answers and explanations after submission. Read-only unless
    /// review editing is enabled.
    Reviewing,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Loading => "loading",
            SessionStatus::Locked => "locked",
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Submitted => "submitted",
            SessionStatus::Reviewing => "reviewing",
        }
    }

    /// True once a score exists for the session.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, SessionStatus::Submitted | SessionStatus::Reviewing)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scoring a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreResult {
    pub correct: u32,
    pub total: u32,
    /// Whole-number percentage, rounded half up.
    pub percentage: u32,
}

impl fmt::Display for ScoreResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}%)", self.correct, self.total, self.percentage)
    }
}
