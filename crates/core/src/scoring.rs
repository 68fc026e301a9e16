//! Scoring engine.
//!
//! Pure functions over the item store and the loaded questions. Nothing here
//! mutates item state, so repeated calls over unchanged input are identical.

use serde::{Deserialize, Serialize};

use crate::items::ItemStore;
use crate::model::{ChoiceLetter, Question, QuestionId, ScoreResult};

/// Per-question result used for progress persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    pub selected_answer: Option<ChoiceLetter>,
    pub is_correct: bool,
}

/// Score every loaded question, across all modules.
///
/// A question counts as correct only when its selected answer equals the
/// correct letter. Eliminations and flags are ignored.
#[must_use]
pub fn compute(items: &ItemStore, questions: &[Question]) -> ScoreResult {
    let correct = questions
        .iter()
        .filter(|q| q.is_correct(items.selected_answer(q.id())))
        .count();

    let correct = u32::try_from(correct).unwrap_or(u32::MAX);
    let total = u32::try_from(questions.len()).unwrap_or(u32::MAX);

    ScoreResult {
        correct,
        total,
        percentage: percentage_half_up(correct, total),
    }
}

/// Per-question outcomes in load order.
#[must_use]
pub fn outcomes(items: &ItemStore, questions: &[Question]) -> Vec<QuestionOutcome> {
    questions
        .iter()
        .map(|q| {
            let selected_answer = items.selected_answer(q.id());
            QuestionOutcome {
                question_id: q.id().clone(),
                selected_answer,
                is_correct: q.is_correct(selected_answer),
            }
        })
        .collect()
}

/// `round(correct / total * 100)` with halves rounded up, in integer arithmetic.
///
/// Returns 0 when `total` is 0.
#[must_use]
pub fn percentage_half_up(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct);
    let total = u64::from(total);
    let rounded = (correct * 200 + total) / (total * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}
