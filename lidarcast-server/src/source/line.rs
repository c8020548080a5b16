use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use lidarcast_core::ScanSample;

use super::ScanSource;
use crate::error::SourceError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const END_OF_SWEEP: &str = "END";
// A driver that never ends its sweep must not grow the buffer forever
const MAX_SWEEP_SAMPLES: usize = 8192;

#[derive(Debug, PartialEq)]
enum Line {
    Sample(ScanSample),
    EndOfSweep,
    Ignored,
    Malformed,
}

// One sample per line: "angle distance" or "angle,distance".
// An empty line or END closes the sweep, '#' starts a comment.
fn parse_line(line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() || line == END_OF_SWEEP {
        return Line::EndOfSweep;
    }
    if line.starts_with('#') {
        return Line::Ignored;
    }

    let mut fields = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty());
    let (Some(angle), Some(distance), None) = (fields.next(), fields.next(), fields.next()) else {
        return Line::Malformed;
    };
    match (angle.parse::<f64>(), distance.parse::<f64>()) {
        (Ok(angle), Ok(distance)) => Line::Sample(ScanSample::new(angle, distance)),
        _ => Line::Malformed,
    }
}

/// Reads sweeps as text lines from a driver process over TCP.
///
/// Samples of a sweep that is only partly received when a read times out
/// are kept and completed by the next call. Lines that are not valid UTF-8
/// count as malformed.
pub struct LineSource {
    name: String,
    reader: Option<BufReader<TcpStream>>,
    line: Vec<u8>,
    pending: Vec<ScanSample>,
    max_samples: usize,
    malformed: u64,
}

impl LineSource {
    pub async fn connect(address: &str) -> Result<Self, SourceError> {
        let open_error = |reason: String| SourceError::Open {
            identifier: format!("tcp://{}", address),
            reason,
        };

        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(open_error(e.to_string())),
            Err(_) => return Err(open_error(format!("no answer within {:?}", CONNECT_TIMEOUT))),
        };
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("tcp://{}: cannot set TCP_NODELAY: {}", address, e);
        }

        Ok(LineSource {
            name: format!("tcp://{}", address),
            reader: Some(BufReader::new(stream)),
            line: Vec::new(),
            pending: Vec::new(),
            max_samples: MAX_SWEEP_SAMPLES,
            malformed: 0,
        })
    }

    /// Lines dropped because they could not be parsed
    pub fn malformed_lines(&self) -> u64 {
        self.malformed
    }
}

#[async_trait]
impl ScanSource for LineSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_cycle(&mut self) -> Result<Vec<ScanSample>, SourceError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| SourceError::Unavailable("source is closed".to_string()))?;

        loop {
            // read_until keeps partial input in self.line, so a timeout
            // around read_cycle does not lose buffered bytes
            if reader.read_until(b'\n', &mut self.line).await? == 0 {
                return Err(SourceError::Unavailable(
                    "connection closed by driver".to_string(),
                ));
            }
            let bytes = std::mem::take(&mut self.line);
            let text = String::from_utf8_lossy(&bytes);
            match parse_line(&text) {
                Line::Sample(sample) => {
                    self.pending.push(sample);
                    if self.pending.len() > self.max_samples {
                        self.pending.clear();
                        return Err(SourceError::Transient(format!(
                            "no end of sweep after {} samples",
                            self.max_samples
                        )));
                    }
                }
                Line::EndOfSweep => return Ok(std::mem::take(&mut self.pending)),
                Line::Ignored => {}
                Line::Malformed => {
                    self.malformed += 1;
                    log::trace!("{}: dropping line {:?}", self.name, text);
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.reader.take().is_some() {
            log::debug!(
                "{}: closed ({} malformed lines dropped)",
                self.name,
                self.malformed
            );
        }
    }
}
