use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};

use lidarcast_server::sink::{SinkRegistry, StdoutSink};
use lidarcast_server::source::open_source;
use lidarcast_server::{probe, web, BroadcastLoop, Cli, Command, ServerConfig, ServerError};

// Distinct exit codes: the scan source died while running, or never came up
const EXIT_RUNTIME_FAILURE: u8 = 1;
const EXIT_STARTUP_FAILURE: u8 = 2;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(1000);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let config = match ServerConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Probe => match probe::probe(&config).await {
            Ok(report) => {
                println!("{}", report);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{:#}", e);
                ExitCode::from(EXIT_RUNTIME_FAILURE)
            }
        },
    }
}

async fn start(
    config: &ServerConfig,
) -> Result<(BroadcastLoop, TcpListener, SinkRegistry), ServerError> {
    let source = open_source(&config.source, config.scan_rate_hz).await?;

    let addr = config.listen_address();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(source) => return Err(ServerError::Bind { addr, source }),
    };

    let (registry, commands) = SinkRegistry::new();
    if config.output {
        registry.attach("stdout", Box::new(StdoutSink::new()));
    }

    let broadcast = BroadcastLoop::new(source, config.broadcast.clone(), commands);
    Ok((broadcast, listener, registry))
}

async fn serve(config: ServerConfig) -> ExitCode {
    let (broadcast, listener, registry) = match start(&config).await {
        Ok(parts) => parts,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    let result = Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new(
            "broadcast",
            move |s: SubsystemHandle| broadcast.run_subsystem(s),
        ));
        s.start(SubsystemBuilder::new("web", move |s: SubsystemHandle| {
            web::run_subsystem(listener, registry, s)
        }));
    })
    .catch_signals()
    .handle_shutdown_requests(SHUTDOWN_TIMEOUT)
    .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(EXIT_RUNTIME_FAILURE)
        }
    }
}
