use super::controller::Controller;
use super::messages::ServerMessage;
use crate::http::AppState;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drive one client connection to completion
///
/// A dedicated writer task owns the socket sink, so audio ingestion and
/// enrichment dispatch never block on the network.
pub async fn run_connection(socket: WebSocket, app: AppState) {
    info!("client connected");

    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<ServerMessage>(64);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("failed to encode outbound message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(payload)).await.is_err() {
                debug!("client socket closed while writing");
                break;
            }
        }
    });

    let mut controller = Controller::new(&app, outbound);

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Binary(data)) => controller.handle_binary(&data).await,
            Ok(Message::Text(text)) => controller.handle_text(&text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("client socket error: {}", e);
                break;
            }
        }
    }

    info!("client disconnected");
    controller.close().await;
    let _ = writer.await;
}
