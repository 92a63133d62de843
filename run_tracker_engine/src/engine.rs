use std::sync::Arc;

use run_tracker_lib::{
    battery::BatteryState,
    coordinate::LocationFix,
    session_record::CompletedSessionRecord,
    tracking_state::TrackingState,
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};

use crate::{
    archive::SessionArchiver,
    configuration::Configuration,
    persistence::{self, PersistenceGateway, PersistenceWriter},
    platform::Platform,
    state_machine::TrackingStateMachine,
};

const OBSERVER_CAPACITY: usize = 64;

/// The tracking session engine.
///
/// Cheap to clone. Every clone drives the same session: fixes, battery
/// updates and user actions from any task are serialized through one lock.
#[derive(Clone)]
pub struct TrackingEngine {
    machine: Arc<Mutex<TrackingStateMachine>>,
    archiver: Arc<dyn SessionArchiver>,
    observers: broadcast::Sender<TrackingState>,
    writer: Arc<Mutex<Option<PersistenceWriter>>>,
}

impl TrackingEngine {
    /// Builds the engine and recovers an unfinished session from `gateway`,
    /// if one was stored. Unreadable snapshots are discarded.
    pub async fn initialize(
        config: &Configuration,
        gateway: Arc<dyn PersistenceGateway>,
        archiver: Arc<dyn SessionArchiver>,
        platform: Platform,
    ) -> Self {
        let snapshot = persistence::load_or_absent(gateway.as_ref()).await;

        let (persist_tx, writer) = PersistenceWriter::spawn(gateway);
        let (observers, _) = broadcast::channel(OBSERVER_CAPACITY);

        let mut machine = TrackingStateMachine::new(platform, config.location_interval, observers.clone(), Some(persist_tx));
        match snapshot {
            Some(snapshot) => {
                machine.restore(snapshot);
            },
            None => tracing::info!("No session to recover"),
        }

        Self {
            machine: Arc::new(Mutex::new(machine)),
            archiver,
            observers,
            writer: Arc::new(Mutex::new(Some(writer))),
        }
    }

    pub async fn start(&self) {
        self.machine.lock().await.start();
    }

    pub async fn pause(&self) {
        self.machine.lock().await.pause();
    }

    pub async fn resume(&self) {
        self.machine.lock().await.resume();
    }

    /// Stops the session and archives it if it covered any distance. The
    /// returned record carries the id the archive assigned.
    pub async fn stop(&self) -> Option<CompletedSessionRecord> {
        let record = self.machine.lock().await.stop();
        self.archive(record).await
    }

    pub async fn on_fix(&self, fix: LocationFix) {
        self.machine.lock().await.on_fix(fix);
    }

    /// Raw battery reading as reported by the device.
    pub async fn on_battery_level(&self, level: i32, scale: i32) -> Option<CompletedSessionRecord> {
        let Some(battery) = BatteryState::from_level(level, scale) else {
            tracing::warn!("Ignoring battery reading {}/{}", level, scale);
            return None;
        };

        self.on_battery_status(battery).await
    }

    pub async fn on_battery_status(&self, battery: BatteryState) -> Option<CompletedSessionRecord> {
        let record = self.machine.lock().await.on_battery_status(battery);
        self.archive(record).await
    }

    pub async fn state(&self) -> TrackingState {
        self.machine.lock().await.state().clone()
    }

    pub fn observe_state(&self) -> broadcast::Receiver<TrackingState> {
        self.observers.subscribe()
    }

    /// Feeds fixes from `fixes` into the engine one at a time, in the order
    /// they arrive. The task ends when the channel closes.
    pub fn attach_fix_stream(&self, mut fixes: mpsc::Receiver<LocationFix>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(fix) = fixes.recv().await {
                engine.on_fix(fix).await;
            }
            tracing::debug!("Fix stream closed");
        })
    }

    /// Waits for every queued snapshot write to land. State changes made after
    /// this are no longer persisted.
    pub async fn shutdown(&self) {
        self.machine.lock().await.detach_persistence();

        let writer = self.writer.lock().await.take();
        if let Some(writer) = writer {
            writer.finish().await;
        }
    }

    async fn archive(&self, record: Option<CompletedSessionRecord>) -> Option<CompletedSessionRecord> {
        let mut record = record?;

        match self.archiver.append(record.clone()).await {
            Ok(session_id) => {
                record.session_id = session_id;
            },
            Err(err) => {
                tracing::error!("Failed to archive session: {}", err);
            },
        }

        Some(record)
    }
}
