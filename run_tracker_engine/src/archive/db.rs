use std::{path::Path, str::FromStr};

use const_format::concatcp;
use run_tracker_lib::session_record::CompletedSessionRecord;
use sqlx::{query_as, sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Executor, Pool, Sqlite, SqlitePool};

use crate::TrackerError;

use super::{constants::*, SessionArchiver};

#[derive(Clone)]
pub struct SessionDatabase {
    pool: Pool<Sqlite>,
}

impl SessionDatabase {
    pub async fn connect(path: &Path) -> Result<Self, TrackerError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await
                .map_err(|_| TrackerError::Archive(format!("Failed to create database directory: {:?}", parent)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|_| TrackerError::Archive(format!("Failed to connect to database: {:?}", path)))?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    /// A private database that lives as long as the returned handle.
    pub async fn in_memory() -> Result<Self, TrackerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|_| TrackerError::Archive("Invalid in-memory database url".to_string()))?;

        // Every connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options).await
            .map_err(|_| TrackerError::Archive("Failed to open in-memory database".to_string()))?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    async fn init(&self) -> Result<(), TrackerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", SESSIONS_TABLE_NAME, "(",
                SESSION_ID,  " INTEGER PRIMARY KEY AUTOINCREMENT,",
                START_TIME,  " TIMESTAMP NOT NULL,",
                END_TIME,    " TIMESTAMP NOT NULL,",
                DISTANCE,    " REAL NOT NULL,",
                DURATION,    " INTEGER NOT NULL,",
                PATH_POINTS, " BLOB NOT NULL
            )")).await
            .map_err(|_| TrackerError::Archive("Failed to create sessions table".to_string()))
            .map(|_| ())
    }

    pub async fn insert_session(&self, record: &CompletedSessionRecord) -> Result<i64, TrackerError> {
        let path_blob = record.get_path_points_blob()
            .map_err(|err| TrackerError::Archive(err.to_string()))?;

        query_as::<_, (i64,)>(concatcp!("
            INSERT INTO ", SESSIONS_TABLE_NAME, "(",
            SESSION_ID, ", ", START_TIME, ", ", END_TIME, ", ", DISTANCE, ", ", DURATION, ", ", PATH_POINTS, ")
            VALUES (NULL, ?1, ?2, ?3, ?4, ?5) RETURNING ", SESSION_ID))
                .bind(record.start_time)
                .bind(record.end_time)
                .bind(record.distance_meters)
                .bind(record.duration_millis)
                .bind(path_blob)
                .fetch_one(&self.pool).await
                .map_err(|_| TrackerError::Archive("Failed to insert session".to_string()))
                .map(|row| row.0)
    }

    pub async fn get_sessions(&self) -> Result<Vec<CompletedSessionRecord>, TrackerError> {
        query_as::<_, CompletedSessionRecord>(concatcp!("SELECT * FROM ", SESSIONS_TABLE_NAME, " ORDER BY ", SESSION_ID))
            .fetch_all(&self.pool).await
            .map_err(|_| TrackerError::Archive("Failed to get sessions".to_string()))
    }
}

#[async_trait::async_trait]
impl SessionArchiver for SessionDatabase {
    async fn append(&self, record: CompletedSessionRecord) -> Result<i64, TrackerError> {
        let session_id = self.insert_session(&record).await?;
        tracing::info!("Archived session {} ({:.1} m)", session_id, record.distance_meters);
        Ok(session_id)
    }

    async fn find_all(&self) -> Result<Vec<CompletedSessionRecord>, TrackerError> {
        self.get_sessions().await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta};
    use run_tracker_lib::coordinate::Coordinate;

    use crate::test_support::scratch_dir;

    use super::*;

    fn record(minutes: i64, distance_meters: f64) -> CompletedSessionRecord {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        CompletedSessionRecord::new(
            start,
            start + TimeDelta::minutes(minutes),
            distance_meters,
            vec![Coordinate::new(55.0, 12.0), Coordinate::new(55.001, 12.0)],
        )
    }

    #[tokio::test]
    async fn append_and_find_all() {
        let db = SessionDatabase::in_memory().await.unwrap();
        assert!(db.find_all().await.unwrap().is_empty());

        let first = db.append(record(30, 5000.0)).await.unwrap();
        let second = db.append(record(10, 1500.0)).await.unwrap();
        assert!(second > first);

        let sessions = db.find_all().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, first);
        assert_eq!(sessions[0].distance_meters, 5000.0);
        assert_eq!(sessions[0].duration_millis, 30 * 60 * 1000);
        assert_eq!(sessions[0].path_points, record(30, 5000.0).path_points);
        assert_eq!(sessions[1].session_id, second);
    }

    #[tokio::test]
    async fn file_database_survives_reconnect() {
        let path = scratch_dir("file_database_survives_reconnect").join("sessions.db");

        let db = SessionDatabase::connect(&path).await.unwrap();
        let id = db.append(record(20, 3000.0)).await.unwrap();
        db.pool.close().await;

        let db = SessionDatabase::connect(&path).await.unwrap();
        let sessions = db.find_all().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, id);
    }
}
