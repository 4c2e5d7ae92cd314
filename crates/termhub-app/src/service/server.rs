//! WebSocket listener and per-client loop.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info, warn};

use termhub_session::SessionHost;

use super::handlers::dispatch;
use super::protocol::{Request, Response, ResponseBody};

/// Accept loop. Runs until the listener errors or the task is dropped at
/// shutdown.
pub async fn run_service(listener: TcpListener, host: Arc<SessionHost>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let host = Arc::clone(&host);
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_client(ws, addr, host).await,
                        Err(e) => {
                            warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "TCP accept error");
            }
        }
    }
}

/// One connected client: interleaves request/response traffic with push
/// frames mirrored from the event bus.
async fn handle_client(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    host: Arc<SessionHost>,
) {
    let (mut sink, mut stream) = ws.split();
    let mut events = host.bus().subscribe();

    info!(peer = %addr, "client connected");

    loop {
        tokio::select! {
            // Host events → push frames.
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_json(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    // This client fell behind; skip the gap rather than
                    // stall the reader loops feeding the bus.
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(peer = %addr, skipped, "client lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            // Client frames → dispatch → response.
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let response = match serde_json::from_str::<Request>(&text) {
                            Ok(request) => dispatch(&host, request),
                            Err(e) => Response {
                                seq: 0,
                                body: ResponseBody::Error {
                                    message: format!("malformed request: {e}"),
                                },
                            },
                        };
                        if send_json(&mut sink, &response).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(peer = %addr, "client disconnected");
}

async fn send_json<T: serde::Serialize>(
    sink: &mut SplitSink<WebSocketStream<TcpStream>, Message>,
    value: &T,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let json = serde_json::to_string(value)
        .map_err(|e| tokio_tungstenite::tungstenite::Error::Io(std::io::Error::other(e)))?;
    sink.send(Message::Text(json.into())).await
}
