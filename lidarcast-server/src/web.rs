//! WebSocket acceptor
//!
//! Every WebSocket connection on `/` or `/ws` becomes a [`WsSink`] handed to
//! the broadcast loop. Clients only listen; anything they send is ignored
//! until they close the connection.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use futures_util::stream::SplitSink;
use tokio::net::TcpListener;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::error::SinkError;
use crate::sink::{BroadcastSink, SinkRegistry};

/// Sending half of one subscriber's WebSocket
pub struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl BroadcastSink for WsSink {
    async fn send(&mut self, payload: &str) -> Result<(), SinkError> {
        self.sender
            .send(Message::Text(payload.to_owned().into()))
            .await
            .map_err(|e| SinkError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sender.close().await;
    }
}

pub fn router(registry: SinkRegistry) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(registry)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(registry): State<SinkRegistry>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, registry))
}

async fn handle_socket(socket: WebSocket, addr: SocketAddr, registry: SinkRegistry) {
    let (sender, mut receiver) = socket.split();
    let Some(id) = registry.attach(addr.to_string(), Box::new(WsSink { sender })) else {
        log::warn!("{}: broadcast has stopped, refusing subscriber", addr);
        return;
    };

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("{}: {}: receive error: {}", id, addr, e);
                break;
            }
        }
    }
    log::debug!("{}: {} disconnected", id, addr);
    registry.detach(id);
}

/// Accept subscribers on `listener` until `shutdown` completes
pub async fn serve<F>(listener: TcpListener, registry: SinkRegistry, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("Streaming objects on ws://{}/ws", addr);
    }
    axum::serve(
        listener,
        router(registry).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Run the acceptor as a graceful-shutdown subsystem
pub async fn run_subsystem(
    listener: TcpListener,
    registry: SinkRegistry,
    subsys: SubsystemHandle,
) -> io::Result<()> {
    let token = subsys.create_cancellation_token();
    serve(listener, registry, async move { token.cancelled().await }).await
}
