pub mod constants;
mod db;

pub use db::SessionDatabase;

use run_tracker_lib::session_record::CompletedSessionRecord;

use crate::TrackerError;

/// Store for finished sessions.
#[async_trait::async_trait]
pub trait SessionArchiver: Send + Sync {
    /// Stores the record and returns the id it was assigned.
    async fn append(&self, record: CompletedSessionRecord) -> Result<i64, TrackerError>;

    /// All archived sessions, oldest first.
    async fn find_all(&self) -> Result<Vec<CompletedSessionRecord>, TrackerError>;
}
