use std::sync::Arc;

use micro_wire_http::connection::TokioTransport;
use micro_wire_ws::{CloseCode, Entropy, Frame, OpCode, WebSocketConfig, WebSocketConnection, WebSocketState};
use tokio::net::TcpStream;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let stream = match TcpStream::connect("127.0.0.1:9001").await {
        Ok(stream) => stream,
        Err(e) => {
            error!(cause = %e, "can't connect");
            return;
        }
    };

    let config = WebSocketConfig::default().with_subprotocol("echo");
    let entropy = Arc::new(Entropy::new());
    let mut ws = match WebSocketConnection::client(TokioTransport::new(stream), config, entropy, "/", Some("127.0.0.1:9001")) {
        Ok(ws) => ws,
        Err(e) => {
            error!(cause = %e, "can't start handshake");
            return;
        }
    };

    if let Err(e) = ws.drive().await {
        error!(cause = %e, "handshake failed");
        return;
    }
    info!(protocol = ?ws.protocol(), "connected");

    let sender = ws.sender();
    for i in 0..3 {
        if let Err(e) = sender.send(Frame::text(format!("message {i}"))) {
            error!(cause = %e, "can't send");
            return;
        }
    }

    let mut echoed = 0;
    loop {
        if let Err(e) = ws.drive().await {
            error!(cause = %e, "connection failed");
            return;
        }
        if ws.state() == WebSocketState::Closed {
            info!("closed");
            return;
        }

        while let Some(frame) = ws.recv() {
            if frame.opcode == OpCode::Text {
                info!(text = frame.as_text().unwrap_or("<invalid utf-8>"), "echo received");
                echoed += 1;
            }
        }
        if echoed == 3 && ws.close(CloseCode::NORMAL, "done").is_err() {
            return;
        }
    }
}
