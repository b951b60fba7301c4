//! Per-connection read and write tasks.
//!
//! The write task drains the hub-owned outbound queue and sends protocol
//! pings. The read task enforces the read deadline and answers client
//! `ping`/`subscribe` messages through a weak handle on the same queue. A
//! shared [`CancellationToken`] stops whichever task is still running once
//! the other one ends.

use std::fmt::Display;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::hub::{ConnectionId, HubHandle};
use super::messages::{WsMessage, reply_to};
use crate::config::HubConfig;

/// Drives one upgraded socket from registration to close.
pub async fn serve_connection(socket: WebSocket, hub: HubHandle) {
    let link = match hub.register().await {
        Ok(link) => link,
        Err(e) => {
            warn!(error = %e, "rejecting websocket, hub unavailable");
            return;
        }
    };
    let id = link.id;
    let config = hub.config().clone();
    let closing = CancellationToken::new();
    let (sink, stream) = socket.split();

    let writer = tokio::spawn(write_loop(
        sink,
        link.outbound,
        config.clone(),
        closing.clone(),
        id,
    ));
    read_loop(stream, &link.replies, &config, &closing, id).await;

    hub.unregister(id).await;
    closing.cancel();
    if writer.await.is_err() {
        warn!(connection_id = %id, "websocket writer task panicked");
    }
    debug!(connection_id = %id, "websocket connection closed");
}

/// Writes queued messages and periodic pings until the queue closes, a
/// write fails or times out, or `closing` fires.
pub async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<String>,
    config: HubConfig,
    closing: CancellationToken,
    id: ConnectionId,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = interval_at(Instant::now() + config.ping_interval, config.ping_interval);

    loop {
        tokio::select! {
            () = closing.cancelled() => break,
            next = outbound.recv() => {
                let Some(first) = next else {
                    let close_frame = sink.send(Message::Close(None));
                    let _ = timeout(config.write_timeout, close_frame).await;
                    break;
                };
                let batch = write_batch(&mut sink, first, &mut outbound);
                let written = timeout(config.write_timeout, batch).await;
                match written {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "websocket write failed");
                        break;
                    }
                    Err(_) => {
                        warn!(connection_id = %id, "websocket write timed out");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                let ping_frame = sink.send(Message::Ping(Bytes::new()));
                let sent = timeout(config.write_timeout, ping_frame).await;
                if !matches!(sent, Ok(Ok(()))) {
                    debug!(connection_id = %id, "websocket ping failed");
                    break;
                }
            }
        }
    }

    closing.cancel();
}

/// Feeds `first` plus everything already waiting in `outbound`, then
/// flushes once. Returns the number of frames written.
///
/// # Errors
///
/// Returns the sink error of the first failed feed or flush.
pub async fn write_batch<S>(
    sink: &mut S,
    first: String,
    outbound: &mut mpsc::Receiver<String>,
) -> Result<usize, S::Error>
where
    S: Sink<Message> + Unpin,
{
    sink.feed(Message::text(first)).await?;
    let mut written = 1;
    while let Ok(next) = outbound.try_recv() {
        sink.feed(Message::text(next)).await?;
        written += 1;
    }
    sink.flush().await?;
    Ok(written)
}

/// Reads client frames until close, error, read deadline, or `closing`.
pub async fn read_loop<St, E>(
    mut stream: St,
    replies: &mpsc::WeakSender<String>,
    config: &HubConfig,
    closing: &CancellationToken,
    id: ConnectionId,
) where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let next = tokio::select! {
            () = closing.cancelled() => break,
            next = timeout(config.read_deadline, stream.next()) => next,
        };
        let frame = match next {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                debug!(connection_id = %id, error = %e, "websocket read failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                debug!(connection_id = %id, "websocket read deadline elapsed");
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                if let Some(reply) = reply_to(text.as_str()) {
                    queue_reply(replies, &reply, id);
                }
            }
            Message::Close(_) => break,
            // Pong and other control frames only refresh the deadline.
            _ => {}
        }
    }
}

fn queue_reply(replies: &mpsc::WeakSender<String>, reply: &WsMessage, id: ConnectionId) {
    let Some(outbound) = replies.upgrade() else {
        return;
    };
    match reply.to_json() {
        Ok(text) => {
            if outbound.try_send(text).is_err() {
                warn!(connection_id = %id, "reply dropped, outbound queue unavailable");
            }
        }
        Err(e) => warn!(connection_id = %id, error = %e, "failed to encode reply"),
    }
}
