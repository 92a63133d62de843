mod file_store;
mod writer;

pub use file_store::FileSnapshotStore;
pub use writer::{PersistCommand, PersistenceWriter};

use run_tracker_lib::snapshot::PersistedSnapshot;

use crate::TrackerError;

#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    Io(String),
    Corrupt(String),
    Timeout,
}

impl From<PersistenceError> for TrackerError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::Io(msg) => TrackerError::Persistence(msg),
            PersistenceError::Corrupt(msg) => TrackerError::Persistence(format!("Corrupt snapshot: {}", msg)),
            PersistenceError::Timeout => TrackerError::Persistence("Timed out".to_string()),
        }
    }
}

/// Durable storage for the in-progress session snapshot.
#[async_trait::async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError>;

    /// `Ok(None)` when nothing has been stored.
    async fn load(&self) -> Result<Option<PersistedSnapshot>, PersistenceError>;

    async fn clear(&self) -> Result<(), PersistenceError>;
}

/// Loads the stored snapshot, treating unreadable or corrupt data the same as
/// no data at all.
pub async fn load_or_absent(gateway: &dyn PersistenceGateway) -> Option<PersistedSnapshot> {
    match gateway.load().await {
        Ok(snapshot) => snapshot,
        Err(PersistenceError::Corrupt(reason)) => {
            tracing::warn!("Discarding corrupt tracking snapshot: {}", reason);
            None
        },
        Err(err) => {
            tracing::warn!("Failed to read tracking snapshot, starting clean: {:?}", err);
            None
        },
    }
}
