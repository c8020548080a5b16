//! Pipeline Settings
//!
//! Explicit configuration for the scan-to-objects pipeline. The server builds
//! one of these from its command line and hands it to the processor and the
//! broadcast loop; nothing here is global.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default clustering distance in meters
pub const DEFAULT_CLUSTER_THRESHOLD_M: f64 = 0.2;

/// Default broadcast period in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("Cluster threshold must be a positive number of meters, got {0}")]
    InvalidThreshold(f64),
    #[error("Tick interval must be at least 1 ms")]
    InvalidInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Two points closer than this belong to the same object
    pub cluster_threshold_m: f64,

    /// Period of the broadcast tick
    pub tick_interval_ms: u64,

    /// Also report the nearest valid return each cycle
    pub report_closest_distance: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            cluster_threshold_m: DEFAULT_CLUSTER_THRESHOLD_M,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            report_closest_distance: false,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.cluster_threshold_m.is_finite() || self.cluster_threshold_m <= 0.0 {
            return Err(PipelineError::InvalidThreshold(self.cluster_threshold_m));
        }
        if self.tick_interval_ms == 0 {
            return Err(PipelineError::InvalidInterval);
        }
        Ok(())
    }
}
