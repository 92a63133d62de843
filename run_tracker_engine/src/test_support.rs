use std::{
    path::PathBuf,
    sync::{atomic::{AtomicBool, AtomicI64, Ordering}, Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use run_tracker_lib::{session_record::CompletedSessionRecord, snapshot::PersistedSnapshot};

use crate::{
    archive::SessionArchiver,
    persistence::{PersistenceError, PersistenceGateway},
    platform::{Clock, LocationPermissions, LocationSource, Platform, ProviderStatus},
    TrackerError,
};

/// A fresh, empty directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("run_tracker_tests")
        .join(format!("{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceCall {
    Request(Duration),
    Stop,
}

#[derive(Clone, Default)]
pub struct RecordingLocationSource {
    pub calls: Arc<Mutex<Vec<SourceCall>>>,
}

impl RecordingLocationSource {
    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requests(&self) -> usize {
        self.calls().iter().filter(|call| matches!(call, SourceCall::Request(_))).count()
    }
}

impl LocationSource for RecordingLocationSource {
    fn request_updates(&mut self, interval: Duration) {
        self.calls.lock().unwrap().push(SourceCall::Request(interval));
    }

    fn stop_updates(&mut self) {
        self.calls.lock().unwrap().push(SourceCall::Stop);
    }
}

/// Provider and permission answers that tests can flip while the engine runs.
#[derive(Clone)]
pub struct Switches {
    pub providers_enabled: Arc<AtomicBool>,
    pub permission_granted: Arc<AtomicBool>,
}

impl Default for Switches {
    fn default() -> Self {
        Self {
            providers_enabled: Arc::new(AtomicBool::new(true)),
            permission_granted: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Switches {
    pub fn set_providers(&self, enabled: bool) {
        self.providers_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }
}

impl ProviderStatus for Switches {
    fn is_any_provider_enabled(&self) -> bool {
        self.providers_enabled.load(Ordering::SeqCst)
    }
}

impl LocationPermissions for Switches {
    fn fine_location_granted(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst)
    }

    fn coarse_location_granted(&self) -> bool {
        false
    }
}

/// Starts at t=1_700_000_000s and only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(1_700_000_000_000)),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, delta: TimeDelta) {
        self.millis.fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap()
    }
}

/// The platform fakes plus handles for inspecting and steering them.
pub struct FakePlatform {
    pub source: RecordingLocationSource,
    pub switches: Switches,
    pub clock: ManualClock,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            source: RecordingLocationSource::default(),
            switches: Switches::default(),
            clock: ManualClock::default(),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform::new(
            Box::new(self.source.clone()),
            Box::new(self.switches.clone()),
            Box::new(self.switches.clone()),
        ).with_clock(Box::new(self.clock.clone()))
    }
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    stored: Mutex<Option<String>>,
    fail_writes: AtomicBool,
    saves: AtomicI64,
}

impl MemorySnapshotStore {
    pub fn with_raw(json: &str) -> Self {
        let store = Self::default();
        *store.stored.lock().unwrap() = Some(json.to_string());
        store
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Option<PersistedSnapshot> {
        self.stored.lock().unwrap().as_deref().and_then(|json| PersistedSnapshot::from_json(json).ok())
    }

    pub fn save_count(&self) -> i64 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for MemorySnapshotStore {
    async fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io("disk full".to_string()));
        }
        let json = snapshot.to_json().map_err(|err| PersistenceError::Corrupt(err.to_string()))?;
        *self.stored.lock().unwrap() = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self) -> Result<Option<PersistedSnapshot>, PersistenceError> {
        match self.stored.lock().unwrap().as_deref() {
            None => Ok(None),
            Some(json) => PersistedSnapshot::from_json(json)
                .map(Some)
                .map_err(|err| PersistenceError::Corrupt(err.to_string())),
        }
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io("disk full".to_string()));
        }
        self.stored.lock().unwrap().take();
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingArchiver {
    records: Mutex<Vec<CompletedSessionRecord>>,
    fail: AtomicBool,
}

impl RecordingArchiver {
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn records(&self) -> Vec<CompletedSessionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SessionArchiver for RecordingArchiver {
    async fn append(&self, mut record: CompletedSessionRecord) -> Result<i64, TrackerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TrackerError::Archive("archive offline".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        record.session_id = records.len() as i64 + 1;
        records.push(record);
        Ok(records.len() as i64)
    }

    async fn find_all(&self) -> Result<Vec<CompletedSessionRecord>, TrackerError> {
        Ok(self.records())
    }
}
