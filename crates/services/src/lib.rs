#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod progress_sync;
pub mod sessions;

pub use exam_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use error::{AppServicesError, SessionError};
pub use progress_sync::ProgressSyncService;

pub use sessions::{
    ExamLoopService, ExamSession, LockReason, ModuleAdvance, SessionCommand, SessionHandle,
    SessionRunner, SessionSnapshot, SubmitOutcome, TickOutcome,
};
