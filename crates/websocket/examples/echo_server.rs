use std::sync::Arc;

use micro_wire_http::connection::TokioTransport;
use micro_wire_ws::{Entropy, WebSocketConfig, WebSocketConnection, WebSocketState};
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 9001, "start listening");
    let listener = match TcpListener::bind("127.0.0.1:9001").await {
        Ok(listener) => listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let entropy = Arc::new(Entropy::new());
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let config = WebSocketConfig::default().with_subprotocol("echo");
        let mut ws = WebSocketConnection::server(TokioTransport::new(stream), config, Arc::clone(&entropy));

        tokio::spawn(async move {
            loop {
                if let Err(e) = ws.drive().await {
                    warn!(%remote_addr, cause = %e, "connection failed");
                    return;
                }
                if ws.state() == WebSocketState::Closed {
                    info!(%remote_addr, "connection closed");
                    return;
                }

                while let Some(frame) = ws.recv() {
                    if !frame.opcode.is_data() {
                        continue;
                    }
                    if let Err(e) = ws.send(frame) {
                        warn!(%remote_addr, cause = %e, "can't echo frame");
                    }
                }
            }
        });
    }
}
