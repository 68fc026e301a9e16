mod ids;
mod item;
mod question;
mod session;

pub use ids::{ParseIdError, QuestionId, TestId, UserId};
pub use item::{ItemState, ItemStatus};
pub use question::{Choice, ChoiceLetter, ChoiceRecord, Question, QuestionError, QuestionRecord};
pub use session::{ScoreResult, SessionStatus};
