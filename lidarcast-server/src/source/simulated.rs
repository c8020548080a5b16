use async_trait::async_trait;

use lidarcast_core::ScanSample;

use super::ScanSource;
use crate::error::SourceError;

// Ring of the first target, and spacing between target rings
const FIRST_RING_M: f64 = 1.0;
const RING_SPACING_M: f64 = 0.6;

// Apparent width of a target (a person's torso seen from the sensor)
const TARGET_WIDTH_M: f64 = 0.3;

// Angular resolution of the simulated sensor
const SAMPLE_STEP_DEG: f64 = 1.0;

// Angular speed of the first target; later targets alternate direction and go faster
const BASE_SPEED_DEG_PER_S: f64 = 20.0;

/// Deterministic stand-in for a real sensor.
///
/// Every target walks around the sensor on its own ring and shows up as a
/// short arc of returns. Sweep `n` always has the same content, so runs are
/// reproducible.
pub struct SimulatedSource {
    targets: usize,
    rate_hz: f64,
    cycle: u64,
}

impl SimulatedSource {
    pub fn new(targets: usize, rate_hz: f64) -> Self {
        SimulatedSource {
            targets,
            rate_hz,
            cycle: 0,
        }
    }

    /// The sweep produced at cycle index `cycle`.
    ///
    /// Targets come in order of bearing; the returns of one target stay
    /// together even when its arc crosses 0°.
    pub fn sweep(&self, cycle: u64) -> Vec<ScanSample> {
        let elapsed = cycle as f64 / self.rate_hz;
        let mut arcs: Vec<(f64, Vec<ScanSample>)> = (0..self.targets)
            .map(|target| {
                let ring = FIRST_RING_M + target as f64 * RING_SPACING_M;
                let direction = if target % 2 == 0 { 1.0 } else { -1.0 };
                let speed = BASE_SPEED_DEG_PER_S * (target + 1) as f64 * direction;
                let bearing = (target as f64 * 137.0 + speed * elapsed).rem_euclid(360.0);
                (bearing, arc(bearing, ring))
            })
            .collect();
        arcs.sort_by(|a, b| a.0.total_cmp(&b.0));
        arcs.into_iter().flat_map(|(_, samples)| samples).collect()
    }
}

fn arc(bearing: f64, ring: f64) -> Vec<ScanSample> {
    let span_deg = (TARGET_WIDTH_M / ring).to_degrees();
    let count = ((span_deg / SAMPLE_STEP_DEG).ceil() as usize).max(2);
    let start = bearing - span_deg / 2.0;
    (0..count)
        .map(|i| {
            let angle = (start + i as f64 * SAMPLE_STEP_DEG).rem_euclid(360.0);
            ScanSample::new(angle, ring)
        })
        .collect()
}

#[async_trait]
impl ScanSource for SimulatedSource {
    fn name(&self) -> &str {
        "sim"
    }

    async fn read_cycle(&mut self) -> Result<Vec<ScanSample>, SourceError> {
        let samples = self.sweep(self.cycle);
        self.cycle += 1;
        Ok(samples)
    }
}
