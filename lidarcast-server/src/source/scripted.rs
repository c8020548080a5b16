use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use lidarcast_core::ScanSample;

use super::ScanSource;
use crate::error::SourceError;

/// One scripted answer to `read_cycle`
#[derive(Debug)]
pub enum ScriptStep {
    Sweep(Vec<ScanSample>),
    Fail(SourceError),
    /// Never answers within `Duration`, then returns an empty sweep
    Stall(Duration),
}

/// In-memory source that replays a fixed script, for tests and embedding.
///
/// When the script runs out every further read reports
/// [`SourceError::Exhausted`].
pub struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
    played: u64,
    closed: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        ScriptedSource {
            steps: steps.into_iter().collect(),
            played: 0,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Script made of plain sweeps given as `(angle, distance)` pairs
    pub fn from_sweeps(sweeps: &[&[(f64, f64)]]) -> Self {
        ScriptedSource::new(sweeps.iter().map(|sweep| {
            ScriptStep::Sweep(sweep.iter().map(|&s| ScanSample::from(s)).collect())
        }))
    }

    pub fn then(mut self, step: ScriptStep) -> Self {
        self.steps.push_back(step);
        self
    }

    /// Becomes true once the source has been closed
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

#[async_trait]
impl ScanSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn read_cycle(&mut self) -> Result<Vec<ScanSample>, SourceError> {
        let step = self
            .steps
            .pop_front()
            .ok_or(SourceError::Exhausted(self.played))?;
        self.played += 1;
        match step {
            ScriptStep::Sweep(samples) => Ok(samples),
            ScriptStep::Fail(e) => Err(e),
            ScriptStep::Stall(duration) => {
                tokio::time::sleep(duration).await;
                Ok(Vec::new())
            }
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
