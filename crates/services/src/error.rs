//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::SessionStatus;
use exam_core::{ItemError, SettingsError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {action} while the session is {status}")]
    InvalidTransition {
        action: &'static str,
        status: SessionStatus,
    },
    #[error("answers cannot change while the session is {status}")]
    NotEditable { status: SessionStatus },
    #[error("session runner has stopped")]
    RunnerClosed,
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
