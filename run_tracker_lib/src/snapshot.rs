use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    coordinate::Coordinate,
    tracking_state::{TrackingPhase, TrackingState},
};

/// The persisted projection of a [`TrackingState`].
///
/// Times are epoch milliseconds with 0 meaning unset, and the phase is carried
/// as the `isStarted`/`isPaused` pair. Unknown keys are ignored on read.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub start_time: i64,
    pub end_time: i64,
    pub distance_meters: f64,
    pub duration_millis: i64,
    pub path_points: Vec<[f64; 2]>,
    pub is_started: bool,
    pub is_paused: bool,
}

impl PersistedSnapshot {
    pub fn to_json(&self) -> Result<String, &'static str> {
        serde_json::to_string(self).map_err(|_| "Failed to serialize snapshot")
    }

    /// Parses and validates a stored snapshot. Anything that could not have
    /// been written by [`PersistedSnapshot::from`] is rejected.
    pub fn from_json(json: &str) -> Result<Self, &'static str> {
        let snapshot: PersistedSnapshot = serde_json::from_str(json).map_err(|_| "Malformed snapshot")?;

        if !snapshot.distance_meters.is_finite() || snapshot.distance_meters < 0.0 {
            return Err("Snapshot distance out of range");
        }

        if snapshot.start_time < 0 || snapshot.end_time < 0 {
            return Err("Snapshot time out of range");
        }

        if snapshot.path_points.iter().flatten().any(|value| !value.is_finite()) {
            return Err("Snapshot path contains non-finite coordinates");
        }

        Ok(snapshot)
    }

    pub fn phase(&self) -> TrackingPhase {
        TrackingPhase::from_flags(self.is_started, self.is_paused)
    }

    /// Rebuilds the session fields of a tracking state. Fields that are not
    /// persisted keep their defaults.
    pub fn into_state(self) -> TrackingState {
        let phase = self.phase();
        TrackingState {
            phase,
            start_time: millis_to_time(self.start_time),
            end_time: millis_to_time(self.end_time),
            distance_meters: self.distance_meters,
            duration_millis: self.duration_millis,
            path_points: self.path_points.into_iter().map(Coordinate::from).collect(),
            ..Default::default()
        }
    }
}

impl From<&TrackingState> for PersistedSnapshot {
    fn from(state: &TrackingState) -> Self {
        let (is_started, is_paused) = state.phase.as_flags();
        Self {
            start_time: state.start_time.map(|time| time.timestamp_millis()).unwrap_or(0),
            end_time: state.end_time.map(|time| time.timestamp_millis()).unwrap_or(0),
            distance_meters: state.distance_meters,
            duration_millis: state.duration_millis,
            path_points: state.path_points.iter().map(|&point| point.into()).collect(),
            is_started,
            is_paused,
        }
    }
}

fn millis_to_time(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}
