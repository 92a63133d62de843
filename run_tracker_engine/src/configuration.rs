use std::{path::{Path, PathBuf}, str::FromStr, time::Duration};

use crate::{TrackerError, DATABASE_FILE_NAME, DATA_DIR, SNAPSHOT_FILE_NAME};

#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub data_dir: PathBuf,
    pub snapshot_file: String,
    pub database_file: String,

    pub location_interval: Duration,

    pub persistence_timeout: Duration,
    pub persistence_retries: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            snapshot_file: SNAPSHOT_FILE_NAME.to_string(),
            database_file: DATABASE_FILE_NAME.to_string(),
            location_interval: Duration::from_millis(5000),
            persistence_timeout: Duration::from_millis(2000),
            persistence_retries: 2,
        }
    }
}

impl Configuration {
    /// Parses `key = value` lines. Blank lines and `#` comments are skipped,
    /// keys that are not recognized are logged and ignored.
    pub fn parse(text: &str) -> Result<Self, TrackerError> {
        let mut config = Configuration::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(TrackerError::Config(format!("Expected key = value, got {:?}", line)));
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "data_dir" => config.data_dir = PathBuf::from(value),
                "snapshot_file" => config.snapshot_file = value.to_string(),
                "database_file" => config.database_file = value.to_string(),
                "location_interval_ms" => config.location_interval = Duration::from_millis(parse_number(key, value)?),
                "persistence_timeout_ms" => config.persistence_timeout = Duration::from_millis(parse_number(key, value)?),
                "persistence_retries" => config.persistence_retries = parse_number(key, value)?,
                _ => {
                    tracing::warn!("Unknown config key: {}", key);
                }
            }
        }

        Ok(config)
    }

    /// Reads the configuration file if it exists, otherwise returns the defaults.
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        if !path.exists() {
            tracing::info!("No configuration at {:?}, using defaults", path);
            return Ok(Configuration::default());
        }

        let text = std::fs::read_to_string(path)
            .map_err(|_| TrackerError::Config(format!("Failed to read configuration file: {:?}", path)))?;

        Self::parse(&text)
    }

    /// The data directory, resolved against the project root when relative.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if self.data_dir.is_absolute() {
            return self.data_dir.clone();
        }

        let root = project_root::get_project_root()
            .or_else(|_| std::env::current_dir())
            .unwrap_or_default();
        root.join(&self.data_dir)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.resolved_data_dir().join(&self.snapshot_file)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolved_data_dir().join(&self.database_file)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, TrackerError> {
    T::from_str(value).map_err(|_| TrackerError::Config(format!("Invalid value for {}: {:?}", key, value)))
}
