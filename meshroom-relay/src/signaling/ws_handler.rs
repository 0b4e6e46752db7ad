use crate::signaling::SignalingService;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use meshroom_core::{ClientFrame, PeerId, ServerFrame};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(member_id): Path<String>,
    State(service): State<SignalingService>,
) -> Response {
    let member_id: PeerId = match member_id.parse() {
        Ok(id) => id,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, member_id, service))
}

async fn handle_socket(socket: WebSocket, member_id: PeerId, service: SignalingService) {
    info!("New WebSocket connection from member {}", member_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let session = service.add_session(member_id, tx);
    let heartbeat = service.heartbeat_interval();
    service.send_to(
        session,
        ServerFrame::Connected {
            member_id,
            heartbeat_ms: heartbeat.as_millis() as u64,
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match frame.to_text() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let silence_limit = heartbeat * 2;

        async move {
            loop {
                let msg = match tokio::time::timeout(silence_limit, receiver.next()).await {
                    Ok(Some(Ok(msg))) => msg,
                    Ok(_) => break,
                    Err(_) => {
                        warn!("Member {} silent for {:?}, closing", member_id, silence_limit);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => {
                            if let Err(e) = service.handle_frame(session, frame) {
                                warn!("Rejected frame from member {}: {}", member_id, e);
                                service.send_to(
                                    session,
                                    ServerFrame::Error {
                                        message: e.to_string(),
                                    },
                                );
                            }
                        }
                        Err(e) => {
                            warn!("Invalid frame from member {}: {}", member_id, e);
                            service.send_to(
                                session,
                                ServerFrame::Error {
                                    message: format!("invalid frame: {e}"),
                                },
                            );
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.remove_session(session);
    info!("WebSocket disconnected: member {}", member_id);
}
