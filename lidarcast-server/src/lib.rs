//! Lidarcast server
//!
//! Reads sweeps from a scan source, turns them into object positions with
//! [`lidarcast_core`] and streams the positions to WebSocket subscribers at a
//! fixed rate.
//!
//! - [`source`]: scan sources (simulation, TCP line driver, replay, scripted)
//! - [`sink`]: subscriber sinks and the registry acceptors use
//! - [`broadcast`]: the tick loop
//! - [`web`]: the WebSocket acceptor
//! - [`probe`]: one-shot source check

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use lidarcast_core::{DEFAULT_CLUSTER_THRESHOLD_M, DEFAULT_TICK_INTERVAL_MS};

pub mod broadcast;
pub mod config;
pub mod error;
pub mod probe;
pub mod sink;
pub mod source;
pub mod web;

pub use broadcast::{BroadcastLoop, LoopConfig, LoopState, LoopStats};
pub use config::ServerConfig;
pub use error::{BroadcastError, ServerError, SinkError, SourceError};

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Command {
    /// Stream object positions to WebSocket subscribers (default)
    Serve,
    /// Open the scan source, read one sweep and report what it contains
    Probe,
}

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address to listen on for WebSocket subscribers
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    /// Port to listen on for WebSocket subscribers
    #[arg(short, long, default_value_t = 8765)]
    pub port: u16,

    /// Scan source: sim, sim:<n>, tcp://host:port, replay:<path> or replay+loop:<path>
    #[arg(short, long, default_value = "sim")]
    pub source: String,

    /// Nominal sweep rate of the sensor in Hz
    #[arg(long, default_value_t = 10.0)]
    pub scan_rate: f64,

    /// Points closer than this many meters belong to the same object
    #[arg(short, long, default_value_t = DEFAULT_CLUSTER_THRESHOLD_M)]
    pub threshold: f64,

    /// Broadcast period in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_TICK_INTERVAL_MS)]
    pub interval: u64,

    /// Give up on a sweep after this many milliseconds
    #[arg(long, default_value_t = 1000)]
    pub read_timeout: u64,

    /// Drop a subscriber that does not take a payload within this many milliseconds
    #[arg(long, default_value_t = 500)]
    pub send_timeout: u64,

    /// Keep reading the scan source while no subscriber is connected
    #[arg(long)]
    pub tick_when_idle: bool,

    /// Also send the distance of the nearest return every cycle
    #[arg(long)]
    pub closest_distance: bool,

    /// Write every payload to stdout as well
    #[arg(long)]
    pub output: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["lidarcast"]);
        assert_eq!(cli.command, None);
        assert_eq!(cli.address, "127.0.0.1");
        assert_eq!(cli.port, 8765);
        assert_eq!(cli.source, "sim");
        assert_eq!(cli.threshold, 0.2);
        assert_eq!(cli.interval, 100);
        assert!(!cli.tick_when_idle);
    }

    #[test]
    fn test_cli_probe() {
        let cli = Cli::parse_from(["lidarcast", "--source", "tcp://10.0.0.2:7000", "probe"]);
        assert_eq!(cli.command, Some(Command::Probe));
        assert_eq!(cli.source, "tcp://10.0.0.2:7000");
    }

    #[test]
    fn test_cli_options() {
        let cli = Cli::parse_from([
            "lidarcast",
            "-p",
            "9000",
            "-t",
            "0.35",
            "-i",
            "50",
            "--closest-distance",
            "-vv",
        ]);
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.threshold, 0.35);
        assert_eq!(cli.interval, 50);
        assert!(cli.closest_distance);
        assert_eq!(cli.verbose.log_level_filter(), log::LevelFilter::Trace);
    }
}
