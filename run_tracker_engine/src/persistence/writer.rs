use std::sync::Arc;

use run_tracker_lib::{snapshot::PersistedSnapshot, tracking_state::TrackingState};
use tokio::{sync::mpsc, task::JoinHandle};

use super::PersistenceGateway;

#[derive(Debug, Clone, PartialEq)]
pub enum PersistCommand {
    Save(PersistedSnapshot),
    Clear,
}

impl PersistCommand {
    /// Open sessions are saved. Anything else has nothing worth recovering, so
    /// the stored snapshot is removed instead.
    pub fn for_state(state: &TrackingState) -> Self {
        if state.phase.is_session_open() {
            PersistCommand::Save(PersistedSnapshot::from(state))
        } else {
            PersistCommand::Clear
        }
    }
}

/// Single writer in front of a [`PersistenceGateway`].
///
/// Commands are applied strictly in the order they were queued. Each command
/// fully replaces the effect of the ones before it, so when several are
/// waiting only the newest is written.
pub struct PersistenceWriter {
    handle: JoinHandle<()>,
}

impl PersistenceWriter {
    pub fn spawn(gateway: Arc<dyn PersistenceGateway>) -> (mpsc::UnboundedSender<PersistCommand>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(writer_actor(gateway, rx));
        (tx, Self { handle })
    }

    /// Waits for every queued command to be written. Only returns once all
    /// senders have been dropped.
    pub async fn finish(self) {
        if let Err(err) = self.handle.await {
            tracing::error!("Persistence writer crashed: {:?}", err);
        }
    }
}

async fn writer_actor(gateway: Arc<dyn PersistenceGateway>, mut rx: mpsc::UnboundedReceiver<PersistCommand>) {
    while let Some(mut command) = rx.recv().await {
        while let Ok(newer) = rx.try_recv() {
            command = newer;
        }

        match command {
            PersistCommand::Save(snapshot) => {
                if let Err(err) = gateway.save(&snapshot).await {
                    tracing::error!("Failed to save tracking snapshot: {:?}", err);
                }
            },
            PersistCommand::Clear => {
                if let Err(err) = gateway.clear().await {
                    tracing::error!("Failed to clear tracking snapshot: {:?}", err);
                }
            },
        }
    }

    tracing::debug!("Persistence writer stopped");
}
