use std::time::Duration;

use lidarcast_core::PipelineSettings;

use crate::broadcast::LoopConfig;
use crate::error::ServerError;
use crate::Cli;

/// Everything the server needs, built once from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Scan source identifier, see [`crate::source`]
    pub source: String,
    pub scan_rate_hz: f64,
    pub broadcast: LoopConfig,
    /// Attach a stdout sink at startup
    pub output: bool,
}

impl ServerConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ServerError> {
        let settings = PipelineSettings {
            cluster_threshold_m: cli.threshold,
            tick_interval_ms: cli.interval,
            report_closest_distance: cli.closest_distance,
        };
        settings.validate()?;

        if !cli.scan_rate.is_finite() || cli.scan_rate <= 0.0 {
            return Err(ServerError::ScanRate(cli.scan_rate));
        }

        if cli.address.trim().is_empty() {
            return Err(ServerError::Address(cli.address.clone()));
        }

        Ok(ServerConfig {
            address: cli.address.clone(),
            port: cli.port,
            source: cli.source.clone(),
            scan_rate_hz: cli.scan_rate,
            broadcast: LoopConfig {
                settings,
                read_timeout: Duration::from_millis(cli.read_timeout.max(1)),
                send_timeout: Duration::from_millis(cli.send_timeout.max(1)),
                tick_when_idle: cli.tick_when_idle,
            },
            output: cli.output,
        })
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
