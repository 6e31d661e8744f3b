use std::{sync::Arc, time::Duration};

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::{task::JoinHandle, time::timeout};
use tracing::{debug, warn};

use super::{
    hub::Relay,
    peers::{Outbound, PeerHandle},
};

/// Longest reason a close frame can carry.
const MAX_CLOSE_REASON: usize = 123;

/// How long the writer gets to push a final close frame after the read side ends.
const CLOSE_FLUSH: Duration = Duration::from_millis(500);

#[debug_handler(state = crate::AppState)]
pub async fn relay_ws(State(relay): State<Arc<Relay>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_peer(socket, relay))
}

async fn serve_peer(socket: WebSocket, relay: Arc<Relay>) {
    let (handle, mut outbound) = PeerHandle::channel();
    let peer_id = relay.connect(handle);
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(out) = outbound.recv().await {
            match out {
                Outbound::Text(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close(reason) => {
                    let frame = CloseFrame {
                        code: close_code::NORMAL,
                        reason: truncate_reason(&reason).into(),
                    };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    });

    let mut writer_done = false;
    let reason = loop {
        tokio::select! {
            _ = &mut send_task => {
                writer_done = true;
                break "socket closed";
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => relay.receive(&peer_id, text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => relay.receive(&peer_id, text),
                    Err(_) => {
                        relay.disconnect(&peer_id, "malformed message");
                    }
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    relay.touch(&peer_id);
                }
                Some(Ok(Message::Close(_))) | None => break "socket disconnected",
                Some(Err(e)) => {
                    warn!(peer = %peer_id, error = %e, "websocket error");
                    break "socket errored";
                }
            }
        }
    };

    debug!(peer = %peer_id, reason, "connection loop ended");
    relay.disconnect(&peer_id, reason);
    if !writer_done && !flush_writer(send_task).await {
        debug!(peer = %peer_id, "writer did not flush close frame in time");
    }
}

/// Waits up to `CLOSE_FLUSH` for the writer to drain, aborting it otherwise.
async fn flush_writer(mut send_task: JoinHandle<()>) -> bool {
    match timeout(CLOSE_FLUSH, &mut send_task).await {
        Ok(_) => true,
        Err(_) => {
            send_task.abort();
            false
        }
    }
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_CLOSE_REASON {
        return reason.to_owned();
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_owned()
}
