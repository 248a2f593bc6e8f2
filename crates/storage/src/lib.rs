#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, QuestionFilter, QuestionStore, ResultRepository,
    SessionSnapshotRepository, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
