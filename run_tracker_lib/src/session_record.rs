use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{prelude::*, sqlite::SqliteRow};

use crate::coordinate::Coordinate;

/// A finished session handed to the archive. `session_id` is -1 until the
/// archive has assigned one.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompletedSessionRecord {
    pub session_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub distance_meters: f64,
    pub duration_millis: i64,
    pub path_points: Vec<Coordinate>,
}

#[cfg(feature = "sqlx")]
impl FromRow<'_, SqliteRow> for CompletedSessionRecord {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let path_blob: Vec<u8> = row.try_get(5)?;
        let path_points = if path_blob.is_empty() {
            Vec::new()
        } else {
            CompletedSessionRecord::path_from_blob(&path_blob)
                .map_err(|err| sqlx::Error::Decode(err.into()))?
        };

        Ok(Self {
            session_id: row.try_get(0)?,
            start_time: row.try_get(1)?,
            end_time: row.try_get(2)?,
            distance_meters: row.try_get(3)?,
            duration_millis: row.try_get(4)?,
            path_points,
        })
    }
}

impl CompletedSessionRecord {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>, distance_meters: f64, path_points: Vec<Coordinate>) -> Self {
        Self {
            session_id: -1,
            start_time,
            end_time,
            distance_meters,
            duration_millis: (end_time - start_time).num_milliseconds(),
            path_points,
        }
    }

    pub fn get_path_points_blob(&self) -> Result<Vec<u8>, &'static str> {
        bincode::serialize(&self.path_points).map_err(|_| "Failed to serialize path points")
    }

    pub fn path_from_blob(blob: &[u8]) -> Result<Vec<Coordinate>, &'static str> {
        bincode::deserialize(blob).map_err(|_| "Failed to deserialize path points")
    }
}

#[test]
fn duration_from_times() {
    let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let end = DateTime::from_timestamp(1_700_000_754, 500_000_000).unwrap();
    let record = CompletedSessionRecord::new(start, end, 1234.5, vec![Coordinate::new(1.0, 2.0)]);

    assert_eq!(record.session_id, -1);
    assert_eq!(record.duration_millis, 754_500);

    let blob = record.get_path_points_blob().unwrap();
    assert_eq!(CompletedSessionRecord::path_from_blob(&blob).unwrap(), record.path_points);
}
