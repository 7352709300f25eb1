use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use podium_db::Database;
use podium_types::events::{NavigatePayload, RevealCommand, RevealEvent};

use crate::dispatcher::Dispatcher;
use crate::reveal::RevealState;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// The client must send Subscribe within this window or the socket is closed.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle one reveal viewer connection for a ranking.
///
/// The channel subscription is only established after the item count is
/// loaded, since index clamping depends on it. Each connection owns a random
/// client id; broadcasts carrying that id are discarded on receipt because
/// the local state machine already applied the transition.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    ranking_id: Uuid,
) {
    let (mut sender, mut receiver) = socket.split();

    if !wait_for_subscribe(&mut receiver).await {
        warn!("Reveal client for {} never subscribed, closing", ranking_id);
        return;
    }

    let item_count = {
        let db = db.clone();
        let rid = ranking_id.to_string();
        match tokio::task::spawn_blocking(move || db.count_items(&rid)).await {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                warn!("Failed to count items for {}: {}", ranking_id, e);
                return;
            }
            Err(e) => {
                warn!("spawn_blocking join error: {}", e);
                return;
            }
        }
    };

    let client_id = Uuid::new_v4();
    let mut state = RevealState::new(item_count);

    info!(
        "Reveal viewer {} connected to {} ({} items)",
        client_id, ranking_id, item_count
    );

    let ready = RevealEvent::Ready {
        client_id,
        item_count,
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    let mut broadcast_rx = dispatcher.subscribe(ranking_id).await;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;
    let mut pong_received = true;

    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                let payload = match result {
                    Ok(payload) => payload,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Reveal receiver for {} lagged by {} messages", ranking_id, n);
                        continue;
                    }
                    Err(_) => break,
                };

                if !apply_broadcast(&mut state, client_id, &payload) {
                    continue;
                }
                let event = RevealEvent::Navigate {
                    current_index: state.current_index(),
                    show_intro: state.show_intro(),
                    sender: payload.sender,
                };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let cmd = match serde_json::from_str::<RevealCommand>(&text) {
                            Ok(cmd) => cmd,
                            Err(e) => {
                                warn!(
                                    "Reveal viewer {} bad command: {} -- raw: {}",
                                    client_id,
                                    e,
                                    clip(&text, 200)
                                );
                                continue;
                            }
                        };

                        if !apply_command(&mut state, cmd) {
                            continue;
                        }

                        let event = RevealEvent::Navigate {
                            current_index: state.current_index(),
                            show_intro: state.show_intro(),
                            sender: client_id,
                        };
                        if send_event(&mut sender, &event).await.is_err() {
                            break;
                        }
                        dispatcher
                            .send(ranking_id, NavigatePayload {
                                current_index: state.current_index(),
                                show_intro: state.show_intro(),
                                sender: client_id,
                            })
                            .await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_received = true;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }

            _ = heartbeat.tick() => {
                if pong_received {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!(
                            "Reveal viewer {} heartbeat timeout (missed {} pongs)",
                            client_id, missed_heartbeats
                        );
                        break;
                    }
                }
                pong_received = false;
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(broadcast_rx);
    dispatcher.prune(ranking_id).await;
    info!("Reveal viewer {} left {}", client_id, ranking_id);
}

/// Apply a received broadcast to the viewer state. Returns whether the
/// viewer's socket should be notified: the sender's own echo is dropped
/// unapplied, since the local state machine already made the transition.
fn apply_broadcast(state: &mut RevealState, client_id: Uuid, payload: &NavigatePayload) -> bool {
    if payload.sender == client_id {
        return false;
    }
    state.apply_remote(payload.current_index, payload.show_intro);
    true
}

/// Apply a local command to the viewer state. Returns whether the resulting
/// state should be broadcast: boundary Next/Prev are silent no-ops, explicit
/// Navigate jumps always broadcast.
fn apply_command(state: &mut RevealState, cmd: RevealCommand) -> bool {
    match cmd {
        // Already subscribed; repeated Subscribe commands are ignored.
        RevealCommand::Subscribe => false,
        RevealCommand::Next => state.next(),
        RevealCommand::Prev => state.prev(),
        RevealCommand::Navigate {
            current_index,
            show_intro,
        } => {
            state.navigate(current_index, show_intro);
            true
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &RevealEvent,
) -> Result<(), axum::Error> {
    sender
        .send(Message::Text(serde_json::to_string(event).unwrap().into()))
        .await
}

/// Truncate client-supplied text for logging without splitting a multibyte
/// character.
fn clip(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

async fn wait_for_subscribe(receiver: &mut SplitStream<WebSocket>) -> bool {
    let wait = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if matches!(
                    serde_json::from_str::<RevealCommand>(&text),
                    Ok(RevealCommand::Subscribe)
                ) {
                    return true;
                }
            }
        }
        false
    });

    wait.await.unwrap_or(false)
}
