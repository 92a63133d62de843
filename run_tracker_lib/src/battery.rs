use serde::{Deserialize, Serialize};

pub const WARNING_THRESHOLD: f32 = 30.0;
pub const DANGER_THRESHOLD: f32 = 20.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatteryStatus {
    #[default]
    Ok,
    Warning,
    Danger,
}

impl BatteryStatus {
    /// Danger is checked before warning, so 20% and below is always danger.
    pub fn classify(percentage: f32) -> Self {
        if percentage <= DANGER_THRESHOLD {
            BatteryStatus::Danger
        } else if percentage <= WARNING_THRESHOLD {
            BatteryStatus::Warning
        } else {
            BatteryStatus::Ok
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BatteryState {
    pub percentage: f32,
    pub status: BatteryStatus,
}

impl BatteryState {
    pub fn from_percentage(percentage: f32) -> Self {
        let percentage = percentage.clamp(0.0, 100.0);
        Self {
            percentage,
            status: BatteryStatus::classify(percentage),
        }
    }

    /// Converts a raw `(level, scale)` reading. Returns None for readings the
    /// battery signal uses to mean "unknown".
    pub fn from_level(level: i32, scale: i32) -> Option<Self> {
        if level < 0 || scale <= 0 {
            return None;
        }

        Some(Self::from_percentage(level as f32 * 100.0 / scale as f32))
    }
}

impl Default for BatteryState {
    fn default() -> Self {
        Self {
            percentage: 100.0,
            status: BatteryStatus::Ok,
        }
    }
}
