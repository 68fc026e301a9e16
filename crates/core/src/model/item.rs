use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::question::ChoiceLetter;

/// Mutable per-question record for one exam session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    pub selected_answer: Option<ChoiceLetter>,
    pub eliminated: BTreeSet<ChoiceLetter>,
    pub flagged: bool,
    pub note: String,
    pub highlights: Vec<String>,
}

impl ItemState {
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.selected_answer.is_some()
    }

    #[must_use]
    pub fn is_eliminated(&self, letter: ChoiceLetter) -> bool {
        self.eliminated.contains(&letter)
    }

    /// Display status used by the question palette.
    ///
    /// Precedence: flagged > answered > eliminated-only > unanswered.
    #[must_use]
    pub fn status(&self) -> ItemStatus {
        if self.flagged {
            ItemStatus::Flagged
        } else if self.selected_answer.is_some() {
            ItemStatus::Answered
        } else if !self.eliminated.is_empty() {
            ItemStatus::Eliminated
        } else {
            ItemStatus::Unanswered
        }
    }
}

/// Palette status of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Flagged,
    Answered,
    Eliminated,
    Unanswered,
}

impl ItemStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Flagged => "flagged",
            ItemStatus::Answered => "answered",
            ItemStatus::Eliminated => "eliminated",
            ItemStatus::Unanswered => "unanswered",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(s: &str) -> ChoiceLetter {
        s.parse().unwrap()
    }

    #[test]
    fn status_precedence() {
        let mut item = ItemState::default();
        assert_eq!(item.status(), ItemStatus::Unanswered);

        item.eliminated.insert(letter("B"));
        assert_eq!(item.status(), ItemStatus::Eliminated);

        item.selected_answer = Some(letter("A"));
        assert_eq!(item.status(), ItemStatus::Answered);

        item.flagged = true;
        assert_eq!(item.status(), ItemStatus::Flagged);
    }
}
