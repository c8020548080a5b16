//! Broadcast Loop
//!
//! Drives the scan cycle at a fixed period and fans every result out to the
//! connected sinks.
//!
//! ```text
//!   Idle ──attach──► Connected ──first payload──► Streaming
//!    ▲                   │                            │
//!    └──── last sink dropped or detached ◄────────────┘
//!
//!   any state ──shutdown or fatal source error──► Closed
//! ```
//!
//! The loop owns the scan source and the active sink set. Acceptors only talk
//! to it through [`SinkRegistry`](crate::sink::SinkRegistry) commands, which
//! are handled between ticks. Shutdown is checked between ticks as well, so a
//! cycle that has started always completes.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_graceful_shutdown::SubsystemHandle;
use tokio_util::sync::CancellationToken;

use lidarcast_core::{BroadcastMessage, CycleResult, PipelineSettings, ScanCycleProcessor};

use crate::error::{BroadcastError, SinkError, SourceError};
use crate::sink::{BroadcastSink, SinkCommand, SinkId};
use crate::source::ScanSource;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Connected,
    Streaming,
    Closed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LoopState::Idle => "idle",
            LoopState::Connected => "connected",
            LoopState::Streaming => "streaming",
            LoopState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub settings: PipelineSettings,
    /// Upper bound for one `read_cycle`; a slower sweep is abandoned
    pub read_timeout: Duration,
    /// Upper bound for one send to one sink; a slower sink is dropped
    pub send_timeout: Duration,
    /// Keep reading the source while nobody listens
    pub tick_when_idle: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            settings: PipelineSettings::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            tick_when_idle: false,
        }
    }
}

impl LoopConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.settings.tick_interval_ms)
    }
}

/// Counters kept over the lifetime of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Cycles that produced a result
    pub cycles: u64,
    /// Cycles given up because of a read timeout or transient source error
    pub abandoned: u64,
    /// Payloads delivered, counted per sink
    pub delivered: u64,
    /// Sinks removed after a failed send
    pub dropped_sinks: u64,
}

struct AttachedSink {
    peer: String,
    sink: Box<dyn BroadcastSink>,
}

pub struct BroadcastLoop {
    source: Box<dyn ScanSource>,
    processor: ScanCycleProcessor,
    config: LoopConfig,
    commands: mpsc::UnboundedReceiver<SinkCommand>,
    commands_open: bool,
    sinks: BTreeMap<SinkId, AttachedSink>,
    state: LoopState,
    stats: LoopStats,
}

impl BroadcastLoop {
    pub fn new(
        source: Box<dyn ScanSource>,
        config: LoopConfig,
        commands: mpsc::UnboundedReceiver<SinkCommand>,
    ) -> Self {
        BroadcastLoop {
            source,
            processor: ScanCycleProcessor::new(&config.settings),
            config,
            commands,
            commands_open: true,
            sinks: BTreeMap::new(),
            state: LoopState::Idle,
            stats: LoopStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            log::debug!(
                "{}: broadcast {} -> {}",
                self.source.name(),
                self.state,
                state
            );
            self.state = state;
        }
    }

    fn check_idle(&mut self) {
        if self.sinks.is_empty() && self.state != LoopState::Closed {
            self.set_state(LoopState::Idle);
        }
    }

    /// Apply one attach or detach request
    pub async fn handle_command(&mut self, command: SinkCommand) {
        match command {
            SinkCommand::Attach { id, peer, sink } => {
                log::info!("{}: {} attached ({})", self.source.name(), id, peer);
                self.sinks.insert(id, AttachedSink { peer, sink });
                if self.state == LoopState::Idle {
                    self.set_state(LoopState::Connected);
                }
            }
            SinkCommand::Detach { id } => match self.sinks.remove(&id) {
                Some(mut attached) => {
                    log::info!(
                        "{}: {} detached ({})",
                        self.source.name(),
                        id,
                        attached.peer
                    );
                    let _ = timeout(self.config.send_timeout, attached.sink.close()).await;
                    self.check_idle();
                }
                None => log::trace!("{}: {} already gone", self.source.name(), id),
            },
        }
    }

    /// Run one cycle: read a sweep, process it and send the result to every
    /// sink.
    ///
    /// Only a fatal source error is returned; everything else is handled
    /// inside the tick.
    pub async fn tick(&mut self) -> Result<(), BroadcastError> {
        let samples = match timeout(self.config.read_timeout, self.source.read_cycle()).await {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) if e.is_fatal() => return Err(e.into()),
            Ok(Err(e)) => {
                log::warn!("{}: {}", self.source.name(), e);
                self.stats.abandoned += 1;
                return Ok(());
            }
            Err(_) => {
                let e = SourceError::Timeout(self.config.read_timeout);
                log::warn!("{}: {}", self.source.name(), e);
                self.stats.abandoned += 1;
                return Ok(());
            }
        };

        let result = self.processor.process(&samples);
        self.stats.cycles += 1;
        if result.skipped > 0 {
            log::debug!(
                "{}: skipped {} malformed samples of {}",
                self.source.name(),
                result.skipped,
                samples.len()
            );
        }
        log::trace!(
            "{}: cycle {}: {} samples, {} objects",
            self.source.name(),
            self.stats.cycles,
            samples.len(),
            result.objects.len()
        );

        let payloads = match self.payloads(&result) {
            Ok(payloads) => payloads,
            Err(e) => {
                log::error!("{}: cannot serialize payload: {}", self.source.name(), e);
                self.stats.abandoned += 1;
                return Ok(());
            }
        };

        let delivered = self.broadcast(&payloads).await;
        if delivered > 0 && self.state == LoopState::Connected {
            self.set_state(LoopState::Streaming);
        }
        Ok(())
    }

    fn payloads(&self, result: &CycleResult) -> serde_json::Result<Vec<String>> {
        let mut payloads = vec![BroadcastMessage::positions(result).to_json()?];
        if self.config.settings.report_closest_distance {
            if let Some(message) = BroadcastMessage::closest_distance(result) {
                payloads.push(message.to_json()?);
            }
        }
        Ok(payloads)
    }

    /// Send all payloads to every sink, in order. Sinks that fail are
    /// dropped. Returns the number of sinks that received everything.
    async fn broadcast(&mut self, payloads: &[String]) -> usize {
        if self.sinks.is_empty() {
            return 0;
        }

        let send_timeout = self.config.send_timeout;
        let outcomes = join_all(self.sinks.iter_mut().map(|(id, attached)| async move {
            for payload in payloads {
                let r = match timeout(send_timeout, attached.sink.send(payload)).await {
                    Ok(r) => r,
                    Err(_) => Err(SinkError::Timeout(send_timeout)),
                };
                if let Err(e) = r {
                    return (*id, Err(e));
                }
            }
            (*id, Ok(()))
        }))
        .await;

        let mut delivered = 0;
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => {
                    if let Some(mut attached) = self.sinks.remove(&id) {
                        log::warn!(
                            "{}: dropping {} ({}): {}",
                            self.source.name(),
                            id,
                            attached.peer,
                            e
                        );
                        let _ = timeout(send_timeout, attached.sink.close()).await;
                        self.stats.dropped_sinks += 1;
                    }
                }
            }
        }
        self.stats.delivered += (delivered * payloads.len()) as u64;
        self.check_idle();
        delivered
    }

    /// Tell every sink why the stream ends
    async fn report_error(&mut self, error: &BroadcastError) {
        let payload = match BroadcastMessage::error(error.to_string()).to_json() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("{}: cannot serialize error payload: {}", self.source.name(), e);
                return;
            }
        };
        self.broadcast(&[payload]).await;
    }

    /// Stop accepting sinks and take over the ones still queued
    async fn drain_commands(&mut self) {
        self.commands.close();
        self.commands_open = false;
        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command).await;
        }
    }

    /// Release the source and every sink
    async fn close(&mut self) {
        self.set_state(LoopState::Closed);
        let send_timeout = self.config.send_timeout;
        for (id, mut attached) in std::mem::take(&mut self.sinks) {
            log::debug!("{}: closing {} ({})", self.source.name(), id, attached.peer);
            let _ = timeout(send_timeout, attached.sink.close()).await;
        }
        self.source.close().await;
    }

    /// Run until `shutdown` is cancelled or the source fails for good.
    ///
    /// On a fatal source error every connected sink receives one error
    /// payload before the loop closes, and the error is returned.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<LoopStats, BroadcastError> {
        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::debug!(
            "{}: broadcasting every {:?}, threshold {} m",
            self.source.name(),
            self.config.interval(),
            self.processor.threshold()
        );

        let result = loop {
            let ticking = self.config.tick_when_idle || !self.sinks.is_empty();

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    log::debug!("{}: shutdown", self.source.name());
                    break Ok(());
                },

                command = self.commands.recv(), if self.commands_open => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            log::debug!("{}: no more subscribers can attach", self.source.name());
                            self.commands_open = false;
                        }
                    }
                },

                _ = ticker.tick(), if ticking => {
                    if let Err(e) = self.tick().await {
                        break Err(e);
                    }
                },
            }
        };

        self.drain_commands().await;
        if let Err(e) = &result {
            log::error!("{}: {}", self.source.name(), e);
            self.report_error(e).await;
        }
        self.close().await;
        result.map(|()| self.stats)
    }

    /// Run as a graceful-shutdown subsystem. A fatal error shuts the whole
    /// process down.
    pub async fn run_subsystem(self, subsys: SubsystemHandle) -> Result<(), BroadcastError> {
        let name = self.source.name().to_string();
        match self.run(subsys.create_cancellation_token()).await {
            Ok(stats) => {
                log::info!(
                    "{}: closed after {} cycles, {} payloads delivered",
                    name,
                    stats.cycles,
                    stats.delivered
                );
                Ok(())
            }
            Err(e) => {
                subsys.request_shutdown();
                Err(e)
            }
        }
    }
}
