use std::{
    io::Read,
    path::Path,
    str::FromStr,
    sync::{atomic::{AtomicUsize, Ordering}, Arc},
    time::Duration,
};

use chrono::{DateTime, Utc};
use run_tracker_lib::coordinate::{Coordinate, LocationFix};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{platform::LocationSource, TrackerError};

pub fn read_gpx(path: &Path) -> Result<Vec<LocationFix>, TrackerError> {
    let file = std::fs::File::open(path)
        .map_err(|_| TrackerError::Replay(format!("Failed to open gpx file: {:?}", path)))?;
    read_gpx_from(std::io::BufReader::new(file))
}

/// Every track point of every segment, in file order. Points without a time
/// reuse the time of the point before them.
pub fn read_gpx_from<R: Read>(reader: R) -> Result<Vec<LocationFix>, TrackerError> {
    let gpx = gpx::read(reader)
        .map_err(|err| TrackerError::Replay(format!("Failed to parse gpx: {}", err)))?;

    let mut time = DateTime::UNIX_EPOCH;
    let mut fixes = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                if let Some(point_time) = point.time {
                    let formatted = point_time.format()
                        .map_err(|_| TrackerError::Replay("Unformattable track point time".to_string()))?;
                    time = DateTime::<Utc>::from_str(&formatted)
                        .map_err(|_| TrackerError::Replay(format!("Invalid track point time: {}", formatted)))?;
                }

                fixes.push(LocationFix::new(Coordinate::from(point.point()), time));
            }
        }
    }

    Ok(fixes)
}

/// A [`LocationSource`] that plays back a recorded track.
///
/// Requesting updates spawns a task that sends the remaining fixes into the
/// channel, waiting `pace` before each one. Stopping aborts that task, and a
/// later request picks up where it left off. Needs a tokio runtime.
pub struct GpxReplaySource {
    fixes: Arc<Vec<LocationFix>>,
    cursor: Arc<AtomicUsize>,
    out: mpsc::Sender<LocationFix>,
    pace: Duration,
    task: Option<JoinHandle<()>>,
}

impl GpxReplaySource {
    pub fn new(fixes: Vec<LocationFix>, out: mpsc::Sender<LocationFix>, pace: Duration) -> Self {
        Self {
            fixes: Arc::new(fixes),
            cursor: Arc::new(AtomicUsize::new(0)),
            out,
            pace,
            task: None,
        }
    }

    /// Skips the first `position` fixes, e.g. the ones a recovered session
    /// already holds.
    pub fn starting_at(self, position: usize) -> Self {
        self.cursor.store(position.min(self.fixes.len()), Ordering::SeqCst);
        self
    }

    /// Shared view of how many fixes have been delivered.
    pub fn cursor(&self) -> Arc<AtomicUsize> {
        self.cursor.clone()
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl LocationSource for GpxReplaySource {
    fn request_updates(&mut self, interval: Duration) {
        if self.is_running() {
            return;
        }

        tracing::debug!(
            "Replaying from fix {} of {} (requested interval {:?}, pace {:?})",
            self.cursor.load(Ordering::SeqCst),
            self.fixes.len(),
            interval,
            self.pace
        );

        self.task = Some(tokio::spawn(replay(
            self.fixes.clone(),
            self.cursor.clone(),
            self.out.clone(),
            self.pace,
        )));
    }

    fn stop_updates(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for GpxReplaySource {
    fn drop(&mut self) {
        self.stop_updates();
    }
}

async fn replay(fixes: Arc<Vec<LocationFix>>, cursor: Arc<AtomicUsize>, out: mpsc::Sender<LocationFix>, pace: Duration) {
    loop {
        let position = cursor.load(Ordering::SeqCst);
        let Some(&fix) = fixes.get(position) else {
            break;
        };

        if !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }

        if out.send(fix).await.is_err() {
            tracing::debug!("Fix receiver dropped, ending replay");
            return;
        }
        cursor.store(position + 1, Ordering::SeqCst);
    }

    tracing::debug!("Replay reached the end of the track");
}
