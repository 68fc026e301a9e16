use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("invalid choice letter: {0:?}")]
    InvalidLetter(String),

    #[error("question {0} has no choices")]
    NoChoices(QuestionId),

    #[error("question {id} repeats choice {letter}")]
    DuplicateChoice { id: QuestionId, letter: ChoiceLetter },

    #[error("question {id} has correct answer {letter} which is not one of its choices")]
    UnknownCorrectAnswer { id: QuestionId, letter: ChoiceLetter },

    #[error("question text cannot be empty")]
    EmptyPrompt,
}

//
// ─── CHOICE LETTER ─────────────────────────────────────────────────────────────
//

/// A single answer letter (`A`, `B`, ...), always stored upper case.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChoiceLetter(char);

impl ChoiceLetter {
    /// Builds a letter from a char, normalizing to upper case.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidLetter` for anything but an ASCII letter.
    pub fn new(c: char) -> Result<Self, QuestionError> {
        if c.is_ascii_alphabetic() {
            Ok(Self(c.to_ascii_uppercase()))
        } else {
            Err(QuestionError::InvalidLetter(c.to_string()))
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Debug for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChoiceLetter({})", self.0)
    }
}

impl fmt::Display for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChoiceLetter {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c),
            _ => Err(QuestionError::InvalidLetter(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChoiceLetter {
    type Error = QuestionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChoiceLetter> for String {
    fn from(value: ChoiceLetter) -> Self {
        value.0.to_string()
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// One answer option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub letter: ChoiceLetter,
    pub text: String,
}

impl Choice {
    #[must_use]
    pub fn new(letter: ChoiceLetter, text: impl Into<String>) -> Self {
        Self {
            letter,
            text: text.into(),
        }
    }
}

/// A validated, immutable exam question.
///
/// Choices are guaranteed non-empty with unique letters, and the correct answer
/// is always one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    number: u32,
    module: u32,
    passage: Option<String>,
    prompt: String,
    choices: Vec<Choice>,
    correct_answer: ChoiceLetter,
    explanation: Option<String>,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, choices are empty or repeat
    /// a letter, or the correct answer is not among the choices.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: QuestionId,
        number: u32,
        module: u32,
        passage: Option<String>,
        prompt: impl Into<String>,
        choices: Vec<Choice>,
        correct_answer: ChoiceLetter,
        explanation: Option<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if choices.is_empty() {
            return Err(QuestionError::NoChoices(id));
        }

        let mut seen = HashSet::with_capacity(choices.len());
        for choice in &choices {
            if !seen.insert(choice.letter) {
                return Err(QuestionError::DuplicateChoice {
                    id,
                    letter: choice.letter,
                });
            }
        }
        if !seen.contains(&correct_answer) {
            return Err(QuestionError::UnknownCorrectAnswer {
                id,
                letter: correct_answer,
            });
        }

        Ok(Self {
            id,
            number,
            module,
            passage: passage.filter(|p| !p.trim().is_empty()),
            prompt,
            choices,
            correct_answer,
            explanation: explanation.filter(|e| !e.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    /// Ordinal number shown to the test taker.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Module number as authored (the first module is usually `1`).
    #[must_use]
    pub fn module(&self) -> u32 {
        self.module
    }

    #[must_use]
    pub fn passage(&self) -> Option<&str> {
        self.passage.as_deref()
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    #[must_use]
    pub fn correct_answer(&self) -> ChoiceLetter {
        self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Returns true if `letter` names one of this question's choices.
    #[must_use]
    pub fn has_letter(&self, letter: ChoiceLetter) -> bool {
        self.choices.iter().any(|c| c.letter == letter)
    }

    #[must_use]
    pub fn is_correct(&self, selected: Option<ChoiceLetter>) -> bool {
        selected == Some(self.correct_answer)
    }
}

//
// ─── FLAT RECORD CONTRACT ──────────────────────────────────────────────────────
//

/// Serialized shape of a question as stored by the content loader.
///
/// Field names follow the camelCase JSON produced by the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: String,
    pub question_number: u32,
    pub module: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
    pub question_text: String,
    pub choices: Vec<ChoiceRecord>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRecord {
    pub letter: String,
    pub text: String,
}

impl QuestionRecord {
    #[must_use]
    pub fn from_question(question: &Question) -> Self {
        Self {
            id: question.id().as_str().to_owned(),
            question_number: question.number(),
            module: question.module(),
            passage: question.passage().map(str::to_owned),
            question_text: question.prompt().to_owned(),
            choices: question
                .choices()
                .iter()
                .map(|c| ChoiceRecord {
                    letter: c.letter.to_string(),
                    text: c.text.clone(),
                })
                .collect(),
            correct_answer: question.correct_answer().to_string(),
            explanation: question.explanation().map(str::to_owned),
        }
    }

    /// Convert the record into a validated `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if any letter or invariant is invalid.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        let choices = self
            .choices
            .into_iter()
            .map(|c| Ok(Choice::new(c.letter.parse()?, c.text)))
            .collect::<Result<Vec<_>, QuestionError>>()?;

        Question::new(
            QuestionId::new(self.id),
            self.question_number,
            self.module,
            self.passage,
            self.question_text,
            choices,
            self.correct_answer.parse()?,
            self.explanation,
        )
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(s: &str) -> ChoiceLetter {
        s.parse().unwrap()
    }

    fn abcd() -> Vec<Choice> {
        ["A", "B", "C", "D"]
            .iter()
            .map(|l| Choice::new(letter(l), format!("option {l}")))
            .collect()
    }

    #[test]
    fn letters_normalize_to_upper_case() {
        assert_eq!(letter("b"), letter("B"));
        assert_eq!(letter(" c ").to_string(), "C");
        assert!("AB".parse::<ChoiceLetter>().is_err());
        assert!("1".parse::<ChoiceLetter>().is_err());
        assert!("".parse::<ChoiceLetter>().is_err());
    }

    #[test]
    fn question_rejects_unknown_correct_answer() {
        let err = Question::new(
            QuestionId::new("q1"),
            1,
            1,
            None,
            "Prompt",
            abcd(),
            letter("E"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, QuestionError::UnknownCorrectAnswer { .. }));
    }

    #[test]
    fn question_rejects_duplicate_letters() {
        let mut choices = abcd();
        choices.push(Choice::new(letter("a"), "again"));
        let err = Question::new(
            QuestionId::new("q1"),
            1,
            1,
            None,
            "Prompt",
            choices,
            letter("A"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, QuestionError::DuplicateChoice { .. }));
    }

    #[test]
    fn blank_passage_and_explanation_are_dropped() {
        let q = Question::new(
            QuestionId::new("q1"),
            1,
            1,
            Some("  ".into()),
            "Prompt",
            abcd(),
            letter("A"),
            Some(String::new()),
        )
        .unwrap();
        assert_eq!(q.passage(), None);
        assert_eq!(q.explanation(), None);
        assert!(q.has_letter(letter("D")));
        assert!(!q.has_letter(letter("X")));
    }

    #[test]
    fn record_parses_upload_json() {
        let json = r#"{
            "id": "q7",
            "questionNumber": 7,
            "module": 1,
            "passage": "The committee met twice.",
            "questionText": "Which choice completes the text?",
            "choices": [
                {"letter": "A", "text": "met"},
                {"letter": "B", "text": "meets"}
            ],
            "correctAnswer": "a"
        }"#;
        let record: QuestionRecord = serde_json::from_str(json).unwrap();
        let question = record.into_question().unwrap();

        assert_eq!(question.number(), 7);
        assert_eq!(question.correct_answer(), letter("A"));
        assert_eq!(question.passage(), Some("The committee met twice."));
        assert_eq!(question.explanation(), None);
    }
}
