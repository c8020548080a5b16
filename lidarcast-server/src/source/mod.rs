//! Scan Sources
//!
//! A scan source delivers one sweep of `(angle, distance)` samples per call.
//! Packet framing and checksums belong to whatever driver sits below it; the
//! broadcast loop only sees finished sweeps.
//!
//! Sources are selected by an identifier string:
//!
//! | Identifier              | Source                                  |
//! |-------------------------|-----------------------------------------|
//! | `sim`, `sim:<n>`        | [`SimulatedSource`] with `n` targets    |
//! | `tcp://host:port`       | [`LineSource`], text lines from a driver |
//! | `replay:<path>`         | [`ReplaySource`], JSON lines, stops at EOF |
//! | `replay+loop:<path>`    | [`ReplaySource`], wraps around at EOF   |

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use lidarcast_core::ScanSample;

use crate::error::SourceError;

mod line;
mod replay;
mod scripted;
mod simulated;

pub use line::LineSource;
pub use replay::ReplaySource;
pub use scripted::{ScriptStep, ScriptedSource};
pub use simulated::SimulatedSource;

const DEFAULT_SIMULATED_TARGETS: usize = 2;

/// Capability the broadcast loop needs from a sensor link
#[async_trait]
pub trait ScanSource: Send {
    /// Short name used as log prefix
    fn name(&self) -> &str;

    /// Read the next complete sweep
    async fn read_cycle(&mut self) -> Result<Vec<ScanSample>, SourceError>;

    /// Release the underlying link. Called once, when the loop closes.
    async fn close(&mut self) {}
}

/// Parsed form of a source identifier
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    Simulated { targets: usize },
    Tcp { address: String },
    Replay { path: PathBuf, looping: bool },
}

impl SourceKind {
    pub fn parse(identifier: &str) -> Result<Self, SourceError> {
        let open_error = |reason: &str| SourceError::Open {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        };

        if identifier == "sim" {
            return Ok(SourceKind::Simulated {
                targets: DEFAULT_SIMULATED_TARGETS,
            });
        }
        if let Some(n) = identifier.strip_prefix("sim:") {
            let targets = n
                .parse::<usize>()
                .map_err(|_| open_error("target count is not a number"))?;
            return Ok(SourceKind::Simulated { targets });
        }
        if let Some(address) = identifier.strip_prefix("tcp://") {
            if address.is_empty() {
                return Err(open_error("missing host:port"));
            }
            return Ok(SourceKind::Tcp {
                address: address.to_string(),
            });
        }
        if let Some(path) = identifier.strip_prefix("replay+loop:") {
            return Ok(SourceKind::Replay {
                path: PathBuf::from(path),
                looping: true,
            });
        }
        if let Some(path) = identifier.strip_prefix("replay:") {
            return Ok(SourceKind::Replay {
                path: PathBuf::from(path),
                looping: false,
            });
        }
        Err(open_error(
            "expected sim, sim:<n>, tcp://host:port, replay:<path> or replay+loop:<path>",
        ))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceKind::Simulated { targets } => write!(f, "sim:{}", targets),
            SourceKind::Tcp { address } => write!(f, "tcp://{}", address),
            SourceKind::Replay { path, looping } => {
                let prefix = if *looping { "replay+loop" } else { "replay" };
                write!(f, "{}:{}", prefix, path.display())
            }
        }
    }
}

/// Open the scan source named by `identifier`.
///
/// `rate_hz` is the nominal sweep rate of the sensor; the simulated source
/// uses it to advance its targets between sweeps.
pub async fn open_source(
    identifier: &str,
    rate_hz: f64,
) -> Result<Box<dyn ScanSource>, SourceError> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return Err(SourceError::Open {
            identifier: identifier.to_string(),
            reason: format!("scan rate must be positive, got {}", rate_hz),
        });
    }

    let kind = SourceKind::parse(identifier)?;
    log::debug!("Opening scan source {} at {} Hz", kind, rate_hz);

    let source: Box<dyn ScanSource> = match kind {
        SourceKind::Simulated { targets } => Box::new(SimulatedSource::new(targets, rate_hz)),
        SourceKind::Tcp { address } => Box::new(LineSource::connect(&address).await?),
        SourceKind::Replay { path, looping } => Box::new(ReplaySource::open(&path, looping)?),
    };
    log::info!("{}: scan source open", source.name());
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(
            SourceKind::parse("sim").unwrap(),
            SourceKind::Simulated { targets: 2 }
        );
        assert_eq!(
            SourceKind::parse("sim:5").unwrap(),
            SourceKind::Simulated { targets: 5 }
        );
        assert_eq!(
            SourceKind::parse("tcp://127.0.0.1:7000").unwrap(),
            SourceKind::Tcp {
                address: "127.0.0.1:7000".to_string()
            }
        );
        assert_eq!(
            SourceKind::parse("replay:/tmp/scans.jsonl").unwrap(),
            SourceKind::Replay {
                path: PathBuf::from("/tmp/scans.jsonl"),
                looping: false
            }
        );
        assert_eq!(
            SourceKind::parse("replay+loop:scans.jsonl").unwrap(),
            SourceKind::Replay {
                path: PathBuf::from("scans.jsonl"),
                looping: true
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(
            SourceKind::parse("COM3"),
            Err(SourceError::Open { .. })
        ));
        assert!(SourceKind::parse("sim:many").is_err());
        assert!(SourceKind::parse("tcp://").is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for id in ["sim:3", "tcp://localhost:7000", "replay:a.jsonl", "replay+loop:b.jsonl"] {
            assert_eq!(SourceKind::parse(id).unwrap().to_string(), id);
        }
    }

    #[tokio::test]
    async fn test_open_rejects_bad_rate() {
        assert!(open_source("sim", 0.0).await.is_err());
        assert!(open_source("sim", f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_open_simulated() {
        let mut source = open_source("sim:1", 10.0).await.unwrap();
        assert_eq!(source.name(), "sim");
        assert!(!source.read_cycle().await.unwrap().is_empty());
        source.close().await;
    }

    #[tokio::test]
    async fn test_open_missing_replay_file() {
        let r = open_source("replay:/nonexistent/lidarcast/scans.jsonl", 10.0).await;
        assert!(matches!(r, Err(SourceError::Open { .. })));
    }
}
