use std::{future::Future, path::PathBuf, time::Duration};

use run_tracker_lib::snapshot::PersistedSnapshot;
use tokio::{fs, time::timeout};

use super::{PersistenceError, PersistenceGateway};

/// Keeps the snapshot as a JSON file. Writes go to a sibling temp file which
/// is then renamed over the snapshot, so a crash mid-write leaves the previous
/// snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
    io_timeout: Duration,
    retries: u32,
}

impl FileSnapshotStore {
    pub fn new(path: PathBuf, io_timeout: Duration, retries: u32) -> Self {
        Self {
            path,
            io_timeout,
            retries,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn with_retries<F, Fut>(&self, what: &str, mut op: F) -> Result<(), PersistenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), PersistenceError>>,
    {
        let mut attempt = 0;
        loop {
            let result = match timeout(self.io_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(PersistenceError::Timeout),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!("Snapshot {} failed ({:?}), attempt {} of {}", what, err, attempt, self.retries);
                },
                Err(err) => return Err(err),
            }
        }
    }

    async fn write_once(&self, json: &str) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await
                .map_err(|_| PersistenceError::Io(format!("Failed to create snapshot directory: {:?}", parent)))?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, json).await
            .map_err(|_| PersistenceError::Io(format!("Failed to write snapshot file: {:?}", temp_path)))?;
        fs::rename(&temp_path, &self.path).await
            .map_err(|_| PersistenceError::Io(format!("Failed to replace snapshot file: {:?}", self.path)))
    }

    async fn remove_once(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(_) => Err(PersistenceError::Io(format!("Failed to remove snapshot file: {:?}", self.path))),
        }
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for FileSnapshotStore {
    async fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError> {
        let json = snapshot.to_json().map_err(|err| PersistenceError::Corrupt(err.to_string()))?;
        self.with_retries("save", || self.write_once(&json)).await
    }

    async fn load(&self) -> Result<Option<PersistedSnapshot>, PersistenceError> {
        let read = timeout(self.io_timeout, fs::read_to_string(&self.path)).await
            .map_err(|_| PersistenceError::Timeout)?;

        let json = match read {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => return Err(PersistenceError::Corrupt("Snapshot is not valid UTF-8".to_string())),
            Err(_) => return Err(PersistenceError::Io(format!("Failed to read snapshot file: {:?}", self.path))),
        };

        PersistedSnapshot::from_json(&json)
            .map(Some)
            .map_err(|err| PersistenceError::Corrupt(err.to_string()))
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.with_retries("clear", || self.remove_once()).await
    }
}
