#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    ContentRepository, InMemoryRepository, ProgressRecord, ProgressRepository, Storage,
    StorageError,
};
