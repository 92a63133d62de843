use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{battery::BatteryState, coordinate::Coordinate};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingPhase {
    #[default]
    Idle,
    Active,
    Paused,
    /// Reported once when a session ends, immediately followed by `Idle`.
    Stopped,
}

impl TrackingPhase {
    /// The `(is_started, is_paused)` pair used by the persisted snapshot.
    pub fn as_flags(&self) -> (bool, bool) {
        match self {
            TrackingPhase::Active => (true, false),
            TrackingPhase::Paused => (false, true),
            TrackingPhase::Idle | TrackingPhase::Stopped => (false, false),
        }
    }

    /// A started flag wins over a paused flag, since a started session is the
    /// one that wants location updates.
    pub fn from_flags(is_started: bool, is_paused: bool) -> Self {
        match (is_started, is_paused) {
            (true, _) => TrackingPhase::Active,
            (false, true) => TrackingPhase::Paused,
            (false, false) => TrackingPhase::Idle,
        }
    }

    pub fn is_session_open(&self) -> bool {
        matches!(self, TrackingPhase::Active | TrackingPhase::Paused)
    }
}

/// The aggregate describing the current session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct TrackingState {
    pub phase: TrackingPhase,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub distance_meters: f64,
    /// Only authoritative once the session is stopped.
    pub duration_millis: i64,
    pub path_points: Vec<Coordinate>,
    pub current_location: Option<Coordinate>,
    pub last_fix_time: Option<DateTime<Utc>>,
    pub is_gps_available: bool,
    pub battery: BatteryState,
}

impl TrackingState {
    /// Wall clock time since the session started, pauses included.
    pub fn elapsed_millis(&self, now: DateTime<Utc>) -> i64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).num_milliseconds(),
            (Some(start), None) => (now - start).num_milliseconds().max(0),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn phase_flags() {
        for phase in [TrackingPhase::Idle, TrackingPhase::Active, TrackingPhase::Paused] {
            let (started, paused) = phase.as_flags();
            assert_eq!(TrackingPhase::from_flags(started, paused), phase);
        }

        assert_eq!(TrackingPhase::Stopped.as_flags(), (false, false));
        assert_eq!(TrackingPhase::from_flags(true, true), TrackingPhase::Active);
    }

    #[test]
    fn elapsed() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut state = TrackingState {
            phase: TrackingPhase::Active,
            start_time: Some(start),
            ..Default::default()
        };

        assert_eq!(state.elapsed_millis(start + TimeDelta::seconds(90)), 90_000);

        state.end_time = Some(start + TimeDelta::seconds(30));
        assert_eq!(state.elapsed_millis(start + TimeDelta::seconds(90)), 30_000);

        assert_eq!(TrackingState::default().elapsed_millis(start), 0);
    }
}
