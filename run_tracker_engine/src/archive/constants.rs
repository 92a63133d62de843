pub const SESSIONS_TABLE_NAME: &str = "RunningSessions";
pub const SESSION_ID: &str = "session_id";
pub const START_TIME: &str = "start_time";
pub const END_TIME: &str = "end_time";
pub const DISTANCE: &str = "distance_meters";
pub const DURATION: &str = "duration_millis";
pub const PATH_POINTS: &str = "path_points";
