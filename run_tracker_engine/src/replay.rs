use std::str::FromStr;

use run_tracker_lib::{
    coordinate::LocationFix,
    session_record::CompletedSessionRecord,
    snapshot::PersistedSnapshot,
};
use tokio::sync::mpsc;

use crate::TrackingEngine;

/// A battery reading injected once `after_fixes` fixes have been delivered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryEvent {
    pub after_fixes: usize,
    pub percent: i32,
}

impl FromStr for BatteryEvent {
    type Err = String;

    /// Parses `<index>:<percent>`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (index, percent) = value.split_once(':').ok_or_else(|| format!("expected <index>:<percent>, got {}", value))?;
        let after_fixes = index.trim().parse().map_err(|_| format!("invalid fix index: {}", index))?;
        let percent = percent.trim().parse().map_err(|_| format!("invalid percent: {}", percent))?;
        Ok(BatteryEvent { after_fixes, percent })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    /// Track index reached, counting fixes a recovered session already held.
    pub delivered: usize,
    pub total: usize,
    pub battery_stopped: bool,
    pub record: Option<CompletedSessionRecord>,
}

/// Where a replay of a `total` point track continues from, given the stored
/// session. Every counted fix of the recovered session came from the track.
pub fn resume_position(snapshot: Option<&PersistedSnapshot>, total: usize) -> usize {
    let Some(snapshot) = snapshot else {
        return 0;
    };
    if !snapshot.phase().is_session_open() {
        return 0;
    }

    let held = snapshot.path_points.len();
    if held > total {
        tracing::warn!("Recovered session holds {} points, track only has {}", held, total);
    }
    held.min(total)
}

/// Feeds a replayed track into `engine` until the track ends or the session
/// is stopped by a battery reading, then stops and archives it.
///
/// The engine session must already be running.
pub async fn replay_track(
    engine: &TrackingEngine,
    fixes: &mut mpsc::Receiver<LocationFix>,
    start_at: usize,
    total: usize,
    battery_at: &[BatteryEvent],
) -> ReplayOutcome {
    let mut delivered = start_at;
    let mut battery_stopped = false;
    let mut record = None;

    loop {
        for event in battery_at.iter().filter(|event| event.after_fixes == delivered) {
            let stopped = engine.on_battery_level(event.percent, 100).await;
            if !engine.state().await.phase.is_session_open() {
                battery_stopped = true;
                record = stopped;
                break;
            }
        }
        if battery_stopped || delivered >= total {
            break;
        }

        let Some(fix) = fixes.recv().await else {
            break;
        };
        engine.on_fix(fix).await;
        delivered += 1;
    }

    if !battery_stopped {
        record = engine.stop().await;
    }

    ReplayOutcome {
        delivered,
        total,
        battery_stopped,
        record,
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use chrono::DateTime;
    use run_tracker_lib::{coordinate::Coordinate, tracking_state::TrackingPhase};

    use crate::{
        configuration::Configuration,
        gpx_util::GpxReplaySource,
        platform::Platform,
        test_support::{MemorySnapshotStore, RecordingArchiver, Switches},
    };

    use super::*;

    fn track(count: usize) -> Vec<LocationFix> {
        (0..count)
            .map(|i| LocationFix::new(Coordinate::new(0.0, i as f64 * 0.001), DateTime::UNIX_EPOCH))
            .collect()
    }

    struct Replay {
        engine: TrackingEngine,
        fixes: mpsc::Receiver<LocationFix>,
        archiver: Arc<RecordingArchiver>,
    }

    async fn replay_engine(count: usize, start_at: usize, store: Arc<MemorySnapshotStore>) -> Replay {
        let (tx, fixes) = mpsc::channel(16);
        let source = GpxReplaySource::new(track(count), tx, Duration::ZERO).starting_at(start_at);
        let switches = Switches::default();
        let platform = Platform::new(Box::new(source), Box::new(switches.clone()), Box::new(switches));
        let archiver = Arc::new(RecordingArchiver::default());
        let engine = TrackingEngine::initialize(&Configuration::default(), store, archiver.clone(), platform).await;

        Replay {
            engine,
            fixes,
            archiver,
        }
    }

    async fn run(replay: &mut Replay, start_at: usize, total: usize, battery_at: &[BatteryEvent]) -> ReplayOutcome {
        tokio::time::timeout(
            Duration::from_secs(5),
            replay_track(&replay.engine, &mut replay.fixes, start_at, total, battery_at),
        ).await.unwrap()
    }

    #[test]
    fn parses_battery_events() {
        assert_eq!("12:15".parse::<BatteryEvent>(), Ok(BatteryEvent { after_fixes: 12, percent: 15 }));
        assert!("12".parse::<BatteryEvent>().is_err());
        assert!("x:15".parse::<BatteryEvent>().is_err());
    }

    #[tokio::test]
    async fn replays_whole_track() {
        let mut replay = replay_engine(5, 0, Arc::new(MemorySnapshotStore::default())).await;
        replay.engine.start().await;

        let outcome = run(&mut replay, 0, 5, &[]).await;

        assert_eq!(outcome.delivered, 5);
        assert!(!outcome.battery_stopped);
        assert_eq!(outcome.record.unwrap().path_points.len(), 5);
        assert_eq!(replay.archiver.records().len(), 1);
    }

    #[tokio::test]
    async fn battery_stop_without_distance_ends_replay() {
        for after_fixes in [0, 1] {
            let mut replay = replay_engine(40, 0, Arc::new(MemorySnapshotStore::default())).await;
            replay.engine.start().await;

            let outcome = run(&mut replay, 0, 40, &[BatteryEvent { after_fixes, percent: 15 }]).await;

            assert!(outcome.battery_stopped);
            assert_eq!(outcome.delivered, after_fixes);
            assert_eq!(outcome.record, None);
            assert!(replay.archiver.records().is_empty());
            assert_eq!(replay.engine.state().await.phase, TrackingPhase::Idle);
        }
    }

    #[tokio::test]
    async fn battery_stop_archives_walked_distance() {
        let mut replay = replay_engine(10, 0, Arc::new(MemorySnapshotStore::default())).await;
        replay.engine.start().await;

        let outcome = run(&mut replay, 0, 10, &[BatteryEvent { after_fixes: 3, percent: 40 }, BatteryEvent { after_fixes: 4, percent: 10 }]).await;

        assert!(outcome.battery_stopped);
        assert_eq!(outcome.delivered, 4);
        assert_eq!(outcome.record.unwrap().path_points.len(), 4);
    }

    #[tokio::test]
    async fn recovered_session_continues_track() {
        let full = track(6);
        let snapshot = PersistedSnapshot {
            start_time: 1_700_000_000_000,
            end_time: 0,
            distance_meters: run_tracker_lib::geo_math::distance_meters(full[0].coordinate, full[1].coordinate),
            duration_millis: 0,
            path_points: vec![full[0].coordinate.into(), full[1].coordinate.into()],
            is_started: true,
            is_paused: false,
        };
        let start_at = resume_position(Some(&snapshot), full.len());
        assert_eq!(start_at, 2);

        let store = Arc::new(MemorySnapshotStore::with_raw(&snapshot.to_json().unwrap()));
        let mut replay = replay_engine(6, start_at, store).await;
        assert_eq!(replay.engine.state().await.phase, TrackingPhase::Active);

        let record = run(&mut replay, start_at, 6, &[]).await.record.unwrap();

        let expected: Vec<_> = full.iter().map(|fix| fix.coordinate).collect();
        assert_eq!(record.path_points, expected);
        let straight = run_tracker_lib::geo_math::distance_meters(full[0].coordinate, full[5].coordinate);
        assert!((record.distance_meters - straight).abs() < 1e-6);
    }

    #[test]
    fn resume_position_for_stored_sessions() {
        let mut snapshot = PersistedSnapshot {
            start_time: 1,
            end_time: 0,
            distance_meters: 10.0,
            duration_millis: 0,
            path_points: vec![[0.0, 0.0]; 3],
            is_started: false,
            is_paused: true,
        };

        assert_eq!(resume_position(None, 10), 0);
        assert_eq!(resume_position(Some(&snapshot), 10), 3);
        assert_eq!(resume_position(Some(&snapshot), 2), 2);

        snapshot.is_paused = false;
        assert_eq!(resume_position(Some(&snapshot), 10), 0);
    }
}
