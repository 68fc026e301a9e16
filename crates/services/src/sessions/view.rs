use exam_core::model::{
    ChoiceLetter, ItemState, ItemStatus, Question, QuestionId, SessionStatus,
};

/// Why a session cannot be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockReason {
    /// The host supplied no test id.
    MissingTestId,
    /// The loader has no content for the test.
    NotFound,
    /// The loader returned an empty question list.
    Empty,
    /// The loader failed; no retry is attempted.
    LoadFailed(String),
}

impl LockReason {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            LockReason::MissingTestId => "no test selected",
            LockReason::NotFound | LockReason::Empty => "questions have not been uploaded",
            LockReason::LoadFailed(detail) => detail,
        }
    }
}

/// Point-in-time session state.
///
/// This is intentionally **not** a UI view-model: timers are raw seconds and
/// indexes are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub module_index: usize,
    pub module_count: usize,
    pub question_index: usize,
    pub remaining_secs: u32,
    pub timer_visible: bool,
    pub timer_warning: bool,
    pub transitioning: bool,
}

/// A choice as rendered for the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceView {
    pub letter: ChoiceLetter,
    pub text: String,
    pub selected: bool,
    pub eliminated: bool,
}

/// The current question with its item state folded in.
///
/// `correct_answer` and `explanation` are only present once the session has
/// been submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub number: u32,
    pub module: u32,
    pub passage: Option<String>,
    pub prompt: String,
    pub choices: Vec<ChoiceView>,
    pub status: ItemStatus,
    pub flagged: bool,
    pub note: String,
    pub highlights: Vec<String>,
    pub correct_answer: Option<ChoiceLetter>,
    pub explanation: Option<String>,
}

impl QuestionView {
    #[must_use]
    pub fn build(question: &Question, state: &ItemState, reveal: bool) -> Self {
        let choices = question
            .choices()
            .iter()
            .map(|c| ChoiceView {
                letter: c.letter,
                text: c.text.clone(),
                selected: state.selected_answer == Some(c.letter),
                eliminated: state.is_eliminated(c.letter),
            })
            .collect();

        Self {
            id: question.id().clone(),
            number: question.number(),
            module: question.module(),
            passage: question.passage().map(str::to_owned),
            prompt: question.prompt().to_owned(),
            choices,
            status: state.status(),
            flagged: state.flagged,
            note: state.note.clone(),
            highlights: state.highlights.clone(),
            correct_answer: reveal.then(|| question.correct_answer()),
            explanation: if reveal {
                question.explanation().map(str::to_owned)
            } else {
                None
            },
        }
    }
}

/// One cell of the question palette for the active module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub index: usize,
    pub number: u32,
    pub status: ItemStatus,
    pub is_current: bool,
}

/// Per-question result shown after submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub question_id: QuestionId,
    pub number: u32,
    pub module: u32,
    pub selected_answer: Option<ChoiceLetter>,
    pub correct_answer: ChoiceLetter,
    pub is_correct: bool,
    pub flagged: bool,
    pub explanation: Option<String>,
}

impl ReviewItem {
    #[must_use]
    pub fn build(question: &Question, state: &ItemState) -> Self {
        Self {
            question_id: question.id().clone(),
            number: question.number(),
            module: question.module(),
            selected_answer: state.selected_answer,
            correct_answer: question.correct_answer(),
            is_correct: question.is_correct(state.selected_answer),
            flagged: state.flagged,
            explanation: question.explanation().map(str::to_owned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::Choice;

    fn letter(s: &str) -> ChoiceLetter {
        s.parse().unwrap()
    }

    fn question() -> Question {
        let choices = ["A", "B", "C"]
            .iter()
            .map(|l| Choice::new(letter(l), format!("text {l}")))
            .collect();
        Question::new(
            QuestionId::new("q1"),
            7,
            1,
            None,
            "Prompt",
            choices,
            letter("C"),
            Some("Because C.".into()),
        )
        .unwrap()
    }

    #[test]
    fn question_view_hides_key_until_revealed() {
        let mut state = ItemState::default();
        state.selected_answer = Some(letter("B"));
        state.eliminated.insert(letter("A"));

        let view = QuestionView::build(&question(), &state, false);
        assert_eq!(view.number, 7);
        assert!(view.choices[0].eliminated);
        assert!(view.choices[1].selected);
        assert_eq!(view.status, ItemStatus::Answered);
        assert_eq!(view.correct_answer, None);
        assert_eq!(view.explanation, None);

        let revealed = QuestionView::build(&question(), &state, true);
        assert_eq!(revealed.correct_answer, Some(letter("C")));
        assert_eq!(revealed.explanation.as_deref(), Some("Because C."));
    }

    #[test]
    fn review_item_marks_correctness() {
        let mut state = ItemState::default();
        state.selected_answer = Some(letter("C"));
        let item = ReviewItem::build(&question(), &state);
        assert!(item.is_correct);
        assert_eq!(item.correct_answer, letter("C"));
    }
}
