//! Lidarcast Core
//!
//! Platform-independent scan-to-objects pipeline. This crate turns one sweep
//! of a 2D range sensor into a list of object positions and defines the JSON
//! messages that carry those positions to subscribers.
//!
//! # Architecture
//!
//! - **geometry**: scan samples, Cartesian points and the polar transform
//! - **cluster**: greedy first-match proximity clustering
//! - **cycle**: one complete scan cycle (validate, transform, cluster, round)
//! - **message**: wire payloads sent to subscribers
//! - **settings**: pipeline configuration
//!
//! There is no I/O, no async and no logging in here; the server crate owns
//! the sensor link, the subscriber transport and the timing.
//!
//! # Usage
//!
//! ```rust
//! use lidarcast_core::{BroadcastMessage, PipelineSettings, ScanCycleProcessor, ScanSample};
//!
//! let processor = ScanCycleProcessor::new(&PipelineSettings::default());
//! let scan = vec![
//!     ScanSample::new(0.0, 1.0),
//!     ScanSample::new(2.0, 1.0),
//!     ScanSample::new(180.0, 1.0),
//! ];
//! let result = processor.process(&scan);
//! assert_eq!(result.objects.len(), 2);
//!
//! let json = BroadcastMessage::positions(&result).to_json().unwrap();
//! assert!(json.starts_with(r#"{"type":"lidar_player_positions""#));
//! ```

pub mod cluster;
pub mod cycle;
pub mod geometry;
pub mod message;
pub mod settings;

pub use cluster::{Cluster, ProximityClusterer};
pub use cycle::{round_coordinate, CycleResult, ObjectEstimate, ScanCycleProcessor};
pub use geometry::{polar_to_cartesian, Point2D, ScanSample};
pub use message::BroadcastMessage;
pub use settings::{
    PipelineError, PipelineSettings, DEFAULT_CLUSTER_THRESHOLD_M, DEFAULT_TICK_INTERVAL_MS,
};
