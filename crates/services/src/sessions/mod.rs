mod progress;
mod runner;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::ModuleProgress;
pub use runner::{SessionCommand, SessionHandle, SessionRunner, SessionSnapshot};
pub use service::{ExamSession, ModuleAdvance, SubmitOutcome, TickOutcome};
pub use view::{ChoiceView, LockReason, PaletteEntry, QuestionView, ReviewItem, SessionState};
pub use workflow::ExamLoopService;
