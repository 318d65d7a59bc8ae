//! WebSocket transport
//!
//! This file implements a minimal WebSocket server that translates protocol
//! JSON messages into feed operations. Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Create a `Client` and a `Session` for each connection
//! - Serialize/deserialize JSON messages and forward them to the session
//! - Release the session's subscriptions once the socket closes

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::client::Client;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::session::{FeedState, Session};

pub async fn start_websocket_server(addr: &str, state: FeedState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}

/// Accepts connections on an already bound listener until accepting fails.
pub async fn serve(listener: TcpListener, state: FeedState) -> std::io::Result<()> {
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "accepted connection");
        let state = state.clone();
        tokio::spawn(handle_connection(stream, state));
    }
}

async fn handle_connection(stream: TcpStream, state: FeedState) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let mut session = Session::new(Client::new(tx));
    let client_id = session.client().id.clone();

    // Forward queued frames (replies and pushes) to the socket.
    let forwarder = {
        let client_id = client_id.clone();
        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send message to {client_id}: {e}");
                    break;
                }
            }
            debug!("Send loop closed for {client_id}");
        })
    };

    let welcome = ServerMessage::Welcome {
        connection_id: session.connection_id().to_string(),
    };
    if let Err(e) = session.client().send(&welcome) {
        error!("Failed to greet {client_id}: {e}");
    }

    while let Some(Ok(msg)) = ws_receiver.next().await {
        if msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else {
            continue;
        };

        let reply = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => session.handle(&state, message),
            Err(err) => {
                warn!(
                    "Invalid client message from {client_id}: {err} | {}",
                    text.chars().take(100).collect::<String>()
                );
                ServerMessage::Error {
                    message: format!("invalid message: {err}"),
                }
            }
        };

        if let Err(e) = session.client().send(&reply) {
            warn!("Failed to reply to {client_id}: {e}");
            break;
        }
    }

    info!("{client_id} disconnected");
    session.close(&state);
    forwarder.abort();
}
