pub mod coordinate;
pub mod geo_math;
pub mod battery;
pub mod tracking_state;
pub mod session_record;
pub mod snapshot;
