//! Item State Store: one mutable `ItemState` per loaded question.
//!
//! The store is keyed by question id and validates every letter against the
//! owning question's choices. It knows nothing about session status; the
//! session controller decides whether a mutation is allowed at all.

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::model::{ChoiceLetter, ItemState, ItemStatus, Question, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ItemError {
    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    #[error("letter {letter} is not a choice of question {id}")]
    InvalidLetter { id: QuestionId, letter: ChoiceLetter },

    #[error("highlight text cannot be empty")]
    EmptyHighlight,
}

#[derive(Debug, Clone)]
struct Entry {
    letters: BTreeSet<ChoiceLetter>,
    state: ItemState,
}

/// Per-session answer state, one entry per question.
#[derive(Debug, Clone)]
pub struct ItemStore {
    entries: HashMap<QuestionId, Entry>,
    clear_answer_on_eliminate: bool,
}

impl ItemStore {
    /// Create an empty `ItemState` for every question.
    ///
    /// Questions sharing an id collapse into a single entry; loaders are expected
    /// to have rejected such content already.
    #[must_use]
    pub fn from_questions(questions: &[Question]) -> Self {
        let entries = questions
            .iter()
            .map(|q| {
                (
                    q.id().clone(),
                    Entry {
                        letters: q.choices().iter().map(|c| c.letter).collect(),
                        state: ItemState::default(),
                    },
                )
            })
            .collect();
        Self {
            entries,
            clear_answer_on_eliminate: false,
        }
    }

    /// Eliminating the currently selected letter also clears the selection.
    #[must_use]
    pub fn with_clear_answer_on_eliminate(mut self, enabled: bool) -> Self {
        self.clear_answer_on_eliminate = enabled;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &QuestionId> {
        self.entries.keys()
    }

    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&ItemState> {
        self.entries.get(id).map(|e| &e.state)
    }

    #[must_use]
    pub fn selected_answer(&self, id: &QuestionId) -> Option<ChoiceLetter> {
        self.get(id).and_then(|s| s.selected_answer)
    }

    #[must_use]
    pub fn status(&self, id: &QuestionId) -> Option<ItemStatus> {
        self.get(id).map(ItemState::status)
    }

    /// Replace the selected answer for a question.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::UnknownQuestion` or `ItemError::InvalidLetter`.
    pub fn set_answer(&mut self, id: &QuestionId, letter: ChoiceLetter) -> Result<(), ItemError> {
        let entry = self.entry_with_letter(id, letter)?;
        entry.state.selected_answer = Some(letter);
        Ok(())
    }

    /// Toggle elimination of a letter. Returns whether the letter is now eliminated.
    ///
    /// Selection and elimination are independent unless the store was built
    /// with [`ItemStore::with_clear_answer_on_eliminate`].
    ///
    /// # Errors
    ///
    /// Returns `ItemError::UnknownQuestion` or `ItemError::InvalidLetter`.
    pub fn toggle_eliminate(
        &mut self,
        id: &QuestionId,
        letter: ChoiceLetter,
    ) -> Result<bool, ItemError> {
        let clear_selected = self.clear_answer_on_eliminate;
        let entry = self.entry_with_letter(id, letter)?;
        let state = &mut entry.state;

        if state.eliminated.remove(&letter) {
            return Ok(false);
        }
        state.eliminated.insert(letter);
        if clear_selected && state.selected_answer == Some(letter) {
            state.selected_answer = None;
        }
        Ok(true)
    }

    /// Flip the review flag. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::UnknownQuestion`.
    pub fn toggle_flag(&mut self, id: &QuestionId) -> Result<bool, ItemError> {
        let state = self.state_mut(id)?;
        state.flagged = !state.flagged;
        Ok(state.flagged)
    }

    /// # Errors
    ///
    /// Returns `ItemError::UnknownQuestion`.
    pub fn set_note(&mut self, id: &QuestionId, note: impl Into<String>) -> Result<(), ItemError> {
        self.state_mut(id)?.note = note.into();
        Ok(())
    }

    /// Append a highlighted span. Adding a span that is already present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::UnknownQuestion` or `ItemError::EmptyHighlight`.
    pub fn add_highlight(
        &mut self,
        id: &QuestionId,
        span: impl Into<String>,
    ) -> Result<(), ItemError> {
        let span = span.into();
        if span.trim().is_empty() {
            return Err(ItemError::EmptyHighlight);
        }
        let state = self.state_mut(id)?;
        if !state.highlights.contains(&span) {
            state.highlights.push(span);
        }
        Ok(())
    }

    /// Remove a highlighted span. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::UnknownQuestion`.
    pub fn remove_highlight(&mut self, id: &QuestionId, span: &str) -> Result<bool, ItemError> {
        let state = self.state_mut(id)?;
        let before = state.highlights.len();
        state.highlights.retain(|h| h != span);
        Ok(state.highlights.len() != before)
    }

    /// Clear every item back to its empty state, keeping the key set.
    pub fn reset(&mut self) {
        for entry in self.entries.values_mut() {
            entry.state = ItemState::default();
        }
    }

    fn state_mut(&mut self, id: &QuestionId) -> Result<&mut ItemState, ItemError> {
        self.entries
            .get_mut(id)
            .map(|e| &mut e.state)
            .ok_or_else(|| ItemError::UnknownQuestion(id.clone()))
    }

    fn entry_with_letter(
        &mut self,
        id: &QuestionId,
        letter: ChoiceLetter,
    ) -> Result<&mut Entry, ItemError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ItemError::UnknownQuestion(id.clone()))?;
        if !entry.letters.contains(&letter) {
            return Err(ItemError::InvalidLetter {
                id: id.clone(),
                letter,
            });
        }
        Ok(entry)
    }
}
