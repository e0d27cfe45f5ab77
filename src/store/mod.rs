mod rest;
mod sqlite;

pub(crate) use rest::check;
pub use rest::RestStore;
pub use sqlite::SqliteStore;

use thiserror::Error;

use crate::models::{
    InterviewPatch, InterviewRecord, JobApplication, JobPatch, NewInterview, NewJob, Profile,
    ProfilePatch,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{table} '{id}' not found")]
    NotFound { table: &'static str, id: String },

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("database not initialized. Run 'jobtrack init' first.")]
    NotInitialized,
}

impl StoreError {
    pub fn not_found(table: &'static str, id: &str) -> Self {
        Self::NotFound {
            table,
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD access to the `jobs`, `interviews` and `profiles` tables.
pub trait RecordStore {
    /// Applications owned by `owner`, newest application date first.
    fn list_jobs(&self, owner: &str) -> StoreResult<Vec<JobApplication>>;
    fn get_job(&self, id: &str) -> StoreResult<JobApplication>;
    fn insert_job(&self, job: &NewJob) -> StoreResult<JobApplication>;
    fn update_job(&self, id: &str, patch: &JobPatch) -> StoreResult<()>;
    /// Removes the application and its interviews.
    fn delete_job(&self, id: &str) -> StoreResult<()>;

    /// Interviews of one application, earliest first.
    fn list_interviews(&self, job_id: &str) -> StoreResult<Vec<InterviewRecord>>;
    fn insert_interview(&self, interview: &NewInterview) -> StoreResult<InterviewRecord>;
    fn update_interview(&self, id: &str, patch: &InterviewPatch) -> StoreResult<()>;
    fn delete_interview(&self, id: &str) -> StoreResult<()>;

    fn get_profile(&self, user_id: &str) -> StoreResult<Profile>;
    fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> StoreResult<()>;
}
