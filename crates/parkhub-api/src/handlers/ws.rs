//! WebSocket handler for live slot and booking updates
//!
//! Clients connect, receive change events as they happen, and re-fetch the
//! affected state over the REST surface. Events are fan-out only; the
//! socket accepts nothing but keepalives.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Message, Session};
use futures::StreamExt;
use parkhub_engine::{ChangeEvent, ReservationEngine};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// WebSocket connection handler
///
/// GET /ws
pub async fn ws_handler(
    req: HttpRequest,
    body: web::Payload,
    engine: web::Data<ReservationEngine>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, body)?;

    let client_ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    info!(client = %client_ip, "websocket connection established");

    let events = engine.notifier().subscribe();
    actix_web::rt::spawn(async move {
        ws_session(session, msg_stream, events, client_ip).await;
    });

    Ok(response)
}

async fn ws_session(
    mut session: Session,
    mut msg_stream: actix_ws::MessageStream,
    mut events: broadcast::Receiver<ChangeEvent>,
    client_ip: String,
) {
    let mut ping_interval = interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            Some(msg) = msg_stream.next() => {
                match msg {
                    Ok(Message::Text(text)) => {
                        if text.contains("ping") {
                            if session.text("{\"type\":\"pong\"}").await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Ping(msg)) => {
                        if session.pong(&msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(reason)) => {
                        info!(client = %client_ip, "client closed connection: {:?}", reason);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(client = %client_ip, "websocket error: {}", e);
                        break;
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if session.text(json).await.is_err() {
                                break;
                            }
                        }
                    }
                    // Fell behind; the client re-syncs on the next event
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(client = %client_ip, skipped, "subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            _ = ping_interval.tick() => {
                if session.ping(b"").await.is_err() {
                    break;
                }
            }
        }
    }

    info!(client = %client_ip, "websocket connection closed");
    let _ = session.close(None).await;
}
