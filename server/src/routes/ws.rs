use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use plotcanvas_shared::{ClientMessage, EditReply, RejectReason, ServerMessage, UserId};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

use super::{UserQuery, caller};
use crate::services::edits;
use crate::state::AppState;

/// `GET /ws?user=<id>`: the persistent edit channel.
pub async fn socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    headers: HeaderMap,
) -> Response {
    let user = caller(&headers, &query);
    ws.on_upgrade(move |socket| session(socket, state, user))
}

async fn session(socket: WebSocket, state: AppState, user: Option<UserId>) {
    info!(user = user.as_deref().unwrap_or(edits::ANONYMOUS), "socket opened");
    let (mut sink, mut stream) = socket.split();
    let mut pushes = BroadcastStream::new(state.push_tx.subscribe());
    let mut session_id = String::new();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "socket read failed");
                        break;
                    }
                };
                let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::Hello { session_id: id }) => {
                        session_id = id;
                        continue;
                    }
                    Ok(ClientMessage::Submit(submission)) => {
                        edits::submit(&state, user.as_deref(), &session_id, submission).await
                    }
                    Err(e) => {
                        warn!(error = %e, "malformed frame");
                        match malformed_reply(text.as_str()) {
                            Some(reply) => reply,
                            None => continue,
                        }
                    }
                };
                if !send(&mut sink, &ServerMessage::Reply(reply)).await {
                    break;
                }
            }
            push = pushes.next() => {
                match push {
                    Some(Ok(frame)) => {
                        if sink.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        // the client refetches tiles after reconnecting
                        warn!(skipped, "socket lagged behind pushes; closing");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = sink.close().await;
    debug!(session_id, "socket closed");
}

/// Returns `false` once the connection is gone.
async fn send<S>(sink: &mut S, message: &ServerMessage) -> bool
where
    S: futures::Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize reply");
            return true;
        }
    };
    sink.send(Message::Text(json.into())).await.is_ok()
}

/// A submission that does not decode still gets an answer when its
/// sequence id can be recovered, so the client can drop it.
fn malformed_reply(text: &str) -> Option<EditReply> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if value.get("type")?.as_str()? != "submit" {
        return None;
    }
    let sequence_id = value.get("sequenceId")?.as_u64()?;
    Some(EditReply::reject(sequence_id, RejectReason::Malformed))
}
