use std::fs;
use std::path::Path;

use async_trait::async_trait;

use lidarcast_core::ScanSample;

use super::ScanSource;
use crate::error::SourceError;

/// Plays back sweeps recorded as JSON lines.
///
/// Each non-empty line holds one sweep as `[[angle, distance], ...]`. The
/// whole file is parsed up front so a bad recording fails at startup, not
/// halfway through a session.
pub struct ReplaySource {
    name: String,
    sweeps: Vec<Vec<ScanSample>>,
    looping: bool,
    position: usize,
    played: u64,
}

impl ReplaySource {
    pub fn open(path: &Path, looping: bool) -> Result<Self, SourceError> {
        let open_error = |reason: String| SourceError::Open {
            identifier: format!("replay:{}", path.display()),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| open_error(e.to_string()))?;
        let sweeps = parse_recording(&text).map_err(open_error)?;
        if sweeps.is_empty() {
            return Err(open_error("recording holds no sweeps".to_string()));
        }
        log::debug!(
            "replay:{}: {} sweeps loaded{}",
            path.display(),
            sweeps.len(),
            if looping { ", looping" } else { "" }
        );

        Ok(ReplaySource {
            name: format!("replay:{}", path.display()),
            sweeps,
            looping,
            position: 0,
            played: 0,
        })
    }
}

fn parse_recording(text: &str) -> Result<Vec<Vec<ScanSample>>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Vec<(f64, f64)>>(line)
                .map(|pairs| pairs.into_iter().map(ScanSample::from).collect())
                .map_err(|e| format!("line {}: {}", index + 1, e))
        })
        .collect()
}

#[async_trait]
impl ScanSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_cycle(&mut self) -> Result<Vec<ScanSample>, SourceError> {
        if self.position == self.sweeps.len() {
            if !self.looping {
                return Err(SourceError::Exhausted(self.played));
            }
            log::debug!("{}: restarting from the first sweep", self.name);
            self.position = 0;
        }
        let sweep = self.sweeps[self.position].clone();
        self.position += 1;
        self.played += 1;
        Ok(sweep)
    }
}
