use run_tracker_lib::{coordinate::Coordinate, geo_math};

/// Adds up the distance between consecutive counted fixes.
///
/// Every fix handed to [`DistanceAccumulator::count`] is counted. There is no
/// accuracy, speed or minimum-displacement filter, so receiver noise shows up
/// in the total.
#[derive(Debug, Clone, Default)]
pub struct DistanceAccumulator {
    last_counted: Option<Coordinate>,
}

impl DistanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes from a restored path, measuring the next fix from its final point.
    pub fn resume_from(path: &[Coordinate]) -> Self {
        Self {
            last_counted: path.last().copied(),
        }
    }

    pub fn reset(&mut self) {
        self.last_counted = None;
    }

    /// Appends `fix` to the path and returns the distance it added.
    pub fn count(&mut self, fix: Coordinate, distance_meters: &mut f64, path: &mut Vec<Coordinate>) -> f64 {
        let added = match self.last_counted {
            Some(last) => geo_math::distance_meters(last, fix),
            None => 0.0,
        };

        *distance_meters += added;
        self.last_counted = Some(fix);
        path.push(fix);

        added
    }
}
