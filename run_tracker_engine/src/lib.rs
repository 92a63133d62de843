pub mod configuration;
pub mod platform;
pub mod accumulator;
pub mod gps;
pub mod state_machine;
pub mod persistence;
pub mod archive;
pub mod gpx_util;
pub mod replay;
mod engine;

#[cfg(test)]
mod test_support;

pub use engine::*;

pub const DATA_DIR: &str = "data/";
pub const SNAPSHOT_FILE_NAME: &str = "tracking_state.json";
pub const DATABASE_FILE_NAME: &str = "sessions.db";

#[derive(Debug)]
pub enum TrackerError {
    Persistence(String),
    Archive(String),
    Config(String),
    Replay(String),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::Persistence(msg) => write!(f, "persistence: {msg}"),
            TrackerError::Archive(msg) => write!(f, "archive: {msg}"),
            TrackerError::Config(msg) => write!(f, "config: {msg}"),
            TrackerError::Replay(msg) => write!(f, "replay: {msg}"),
        }
    }
}

impl std::error::Error for TrackerError {}
