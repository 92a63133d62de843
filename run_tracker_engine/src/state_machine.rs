use std::time::Duration;

use run_tracker_lib::{
    battery::{BatteryState, BatteryStatus},
    coordinate::LocationFix,
    session_record::CompletedSessionRecord,
    snapshot::PersistedSnapshot,
    tracking_state::{TrackingPhase, TrackingState},
};
use tokio::sync::{broadcast, mpsc};

use crate::{
    accumulator::DistanceAccumulator,
    gps::GpsAvailabilityMonitor,
    persistence::PersistCommand,
    platform::{Clock, LocationSource, Platform},
};

/// Owner of the session state.
///
/// Every operation is total: calls that make no sense in the current phase
/// are no-ops. Each change is published to observers and queued for
/// persistence, except the first state after construction or restore, which
/// is already what storage holds.
pub struct TrackingStateMachine {
    state: TrackingState,
    accumulator: DistanceAccumulator,

    location_source: Box<dyn LocationSource>,
    gps: GpsAvailabilityMonitor,
    clock: Box<dyn Clock>,
    location_interval: Duration,
    updates_requested: bool,

    started_in_process: bool,
    last_battery_status: BatteryStatus,

    observers: broadcast::Sender<TrackingState>,
    persistence: Option<mpsc::UnboundedSender<PersistCommand>>,
    skip_next_persist: bool,
    clear_queued: bool,
}

impl TrackingStateMachine {
    pub fn new(
        platform: Platform,
        location_interval: Duration,
        observers: broadcast::Sender<TrackingState>,
        persistence: Option<mpsc::UnboundedSender<PersistCommand>>,
    ) -> Self {
        let gps = GpsAvailabilityMonitor::new(platform.provider_status, platform.permissions);
        let state = TrackingState {
            is_gps_available: gps.is_available(),
            ..Default::default()
        };

        let mut machine = Self {
            state,
            accumulator: DistanceAccumulator::new(),
            location_source: platform.location_source,
            gps,
            clock: platform.clock,
            location_interval,
            updates_requested: false,
            started_in_process: false,
            last_battery_status: BatteryStatus::default(),
            observers,
            persistence,
            skip_next_persist: true,
            clear_queued: false,
        };

        machine.publish();
        machine
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingState> {
        self.observers.subscribe()
    }

    /// Drops the persistence queue so the writer can drain and exit.
    pub fn detach_persistence(&mut self) {
        self.persistence.take();
    }

    pub fn start(&mut self) {
        if self.state.phase == TrackingPhase::Active {
            return;
        }
        if self.state.phase == TrackingPhase::Paused {
            tracing::warn!("Starting a new session discards the paused one ({:.1} m)", self.state.distance_meters);
        }

        self.started_in_process = true;

        self.state = TrackingState {
            phase: TrackingPhase::Active,
            start_time: Some(self.clock.now()),
            current_location: self.state.current_location,
            is_gps_available: self.gps.is_available(),
            battery: self.state.battery,
            ..Default::default()
        };
        self.accumulator.reset();
        self.request_updates();

        tracing::info!("Session started");
        self.publish();
    }

    pub fn pause(&mut self) {
        if self.state.phase != TrackingPhase::Active {
            return;
        }

        self.state.phase = TrackingPhase::Paused;

        tracing::info!("Session paused at {:.1} m", self.state.distance_meters);
        self.publish();
    }

    /// Continues measuring from the last fix counted before the pause.
    pub fn resume(&mut self) {
        if self.state.phase != TrackingPhase::Paused {
            return;
        }

        self.state.phase = TrackingPhase::Active;
        if !self.updates_requested {
            self.request_updates();
        }

        tracing::info!("Session resumed");
        self.publish();
    }

    /// Ends the session and resets to idle. Returns the record to archive when
    /// the session covered any distance.
    pub fn stop(&mut self) -> Option<CompletedSessionRecord> {
        if self.state.phase == TrackingPhase::Idle && self.state.distance_meters == 0.0 {
            return None;
        }

        let now = self.clock.now();
        self.state.phase = TrackingPhase::Stopped;
        self.state.end_time = Some(now);
        self.state.duration_millis = self.state.elapsed_millis(now);

        let record = match self.state.start_time {
            Some(start_time) if self.state.distance_meters > 0.0 => Some(CompletedSessionRecord::new(
                start_time,
                now,
                self.state.distance_meters,
                self.state.path_points.clone(),
            )),
            _ => None,
        };

        self.location_source.stop_updates();
        self.updates_requested = false;

        tracing::info!(
            "Session stopped after {} ms, {:.1} m over {} points",
            self.state.duration_millis,
            self.state.distance_meters,
            self.state.path_points.len()
        );
        self.publish();

        self.state = TrackingState {
            battery: self.state.battery,
            ..Default::default()
        };
        self.accumulator.reset();
        self.publish();

        record
    }

    pub fn on_fix(&mut self, fix: LocationFix) {
        self.state.current_location = Some(fix.coordinate);
        self.state.last_fix_time = Some(fix.timestamp);
        self.state.is_gps_available = self.gps.is_available();

        if self.state.phase == TrackingPhase::Active {
            let added = self.accumulator.count(fix.coordinate, &mut self.state.distance_meters, &mut self.state.path_points);
            tracing::debug!(
                "Fix ({}, {}) added {:.2} m, total {:.1} m",
                fix.coordinate.latitude,
                fix.coordinate.longitude,
                added,
                self.state.distance_meters
            );
        }

        self.publish();
    }

    /// Records the battery state. Entering the danger tier stops the session,
    /// entering the warning tier is logged; staying in a tier does neither.
    pub fn on_battery_status(&mut self, battery: BatteryState) -> Option<CompletedSessionRecord> {
        self.state.battery = battery;

        let previous = std::mem::replace(&mut self.last_battery_status, battery.status);
        if previous == battery.status {
            self.publish();
            return None;
        }

        match battery.status {
            BatteryStatus::Ok => {
                self.publish();
                None
            },
            BatteryStatus::Warning => {
                tracing::warn!("Battery low: {:.0}%", battery.percentage);
                self.publish();
                None
            },
            BatteryStatus::Danger => {
                tracing::warn!("Battery critical at {:.0}%, stopping session", battery.percentage);
                self.publish();
                self.stop()
            },
        }
    }

    /// Loads a stored session. Only honored before the first `start` of this
    /// process; later calls are ignored.
    pub fn restore(&mut self, snapshot: PersistedSnapshot) -> bool {
        if self.started_in_process {
            tracing::warn!("Ignoring snapshot restore, a session was already started");
            return false;
        }

        let battery = self.state.battery;
        let current_location = self.state.current_location;
        self.state = TrackingState {
            current_location,
            is_gps_available: self.gps.is_available(),
            battery,
            ..snapshot.into_state()
        };
        self.accumulator = DistanceAccumulator::resume_from(&self.state.path_points);

        if self.state.phase == TrackingPhase::Active {
            self.request_updates();
        }

        tracing::info!(
            "Restored {:?} session with {:.1} m over {} points",
            self.state.phase,
            self.state.distance_meters,
            self.state.path_points.len()
        );
        self.skip_next_persist = true;
        self.clear_queued = false;
        self.publish();
        true
    }

    fn request_updates(&mut self) {
        if !self.gps.has_location_permission() {
            tracing::warn!("No location permission, not requesting updates");
            self.state.is_gps_available = false;
            self.updates_requested = false;
            return;
        }

        self.location_source.request_updates(self.location_interval);
        self.updates_requested = true;
    }

    fn publish(&mut self) {
        if self.skip_next_persist {
            self.skip_next_persist = false;
        } else if let Some(persistence) = &self.persistence {
            let command = PersistCommand::for_state(&self.state);
            let is_clear = command == PersistCommand::Clear;

            // Nothing is stored after a clear until the next save
            if !(is_clear && self.clear_queued) {
                self.clear_queued = is_clear;
                if persistence.send(command).is_err() {
                    tracing::warn!("Persistence writer is gone, snapshot not queued");
                }
            }
        }

        // No subscribers is fine
        let _ = self.observers.send(self.state.clone());
    }
}
