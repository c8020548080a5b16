//! Scan Cycle Processing
//!
//! One sweep in, one [`CycleResult`] out: drop malformed samples, transform
//! to Cartesian, cluster, and round each centroid to centimeters.

use serde::{Deserialize, Serialize};

use crate::cluster::ProximityClusterer;
use crate::geometry::{Point2D, ScanSample};
use crate::settings::PipelineSettings;

/// Round to two decimals, half away from zero.
///
/// Negative zero comes out as `0.0` so tiny negative values do not show up
/// as `-0.0` in the JSON payload.
pub fn round_coordinate(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}

/// Position of one detected object, in meters, rounded to 2 decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectEstimate {
    pub x: f64,
    pub y: f64,
}

impl From<Point2D> for ObjectEstimate {
    fn from(p: Point2D) -> Self {
        ObjectEstimate {
            x: round_coordinate(p.x),
            y: round_coordinate(p.y),
        }
    }
}

/// Outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleResult {
    /// Object positions in cluster creation order
    pub objects: Vec<ObjectEstimate>,
    /// Samples dropped because they were not finite or had a negative distance
    pub skipped: usize,
    /// Nearest valid return of the sweep, rounded like the coordinates
    pub closest_distance: Option<f64>,
}

impl CycleResult {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanCycleProcessor {
    clusterer: ProximityClusterer,
}

impl Default for ScanCycleProcessor {
    fn default() -> Self {
        ScanCycleProcessor::new(&PipelineSettings::default())
    }
}

impl ScanCycleProcessor {
    pub fn new(settings: &PipelineSettings) -> Self {
        ScanCycleProcessor {
            clusterer: ProximityClusterer::new(settings.cluster_threshold_m),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.clusterer.threshold()
    }

    /// Run one complete cycle over the samples of a sweep.
    ///
    /// An empty sweep gives an empty result, not an error.
    pub fn process(&self, samples: &[ScanSample]) -> CycleResult {
        let mut skipped = 0;
        let mut closest: Option<f64> = None;
        let mut points = Vec::with_capacity(samples.len());

        for sample in samples {
            if !sample.is_valid() {
                skipped += 1;
                continue;
            }
            closest = Some(closest.map_or(sample.distance, |c| c.min(sample.distance)));
            points.push(sample.to_cartesian());
        }

        let objects = self
            .clusterer
            .centroids(&points)
            .into_iter()
            .map(ObjectEstimate::from)
            .collect();

        CycleResult {
            objects,
            skipped,
            closest_distance: closest.map(round_coordinate),
        }
    }
}
