//! One-shot check of the scan source, for installation and wiring tests

use std::fmt;

use anyhow::{Context, Result};
use tokio::time::timeout;

use lidarcast_core::ScanCycleProcessor;

use crate::config::ServerConfig;
use crate::source::open_source;

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub source: String,
    pub samples: usize,
    pub skipped: usize,
    pub objects: usize,
    pub closest_distance: Option<f64>,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: scan source is working: {} samples ({} malformed), {} objects",
            self.source, self.samples, self.skipped, self.objects
        )?;
        if let Some(d) = self.closest_distance {
            write!(f, ", closest return {} m", d)?;
        }
        Ok(())
    }
}

/// Open the configured source, read one sweep and close it again
pub async fn probe(config: &ServerConfig) -> Result<ProbeReport> {
    let mut source = open_source(&config.source, config.scan_rate_hz)
        .await
        .with_context(|| format!("Cannot reach scan source '{}'", config.source))?;

    let read_timeout = config.broadcast.read_timeout;
    let sweep = timeout(read_timeout, source.read_cycle()).await;
    let name = source.name().to_string();
    source.close().await;

    let samples = sweep
        .with_context(|| format!("{}: no sweep within {:?}", name, read_timeout))?
        .with_context(|| format!("{}: connected but reading failed", name))?;

    let result = ScanCycleProcessor::new(&config.broadcast.settings).process(&samples);
    Ok(ProbeReport {
        source: name,
        samples: samples.len(),
        skipped: result.skipped,
        objects: result.objects.len(),
        closest_distance: result.closest_distance,
    })
}
