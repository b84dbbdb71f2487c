use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::sse_events,
    session::room_code,
    state::SharedState,
    store::{Subscription, paths},
};

/// Open the display stream of room `code`: the room document on connect and
/// after every change, plus host events when the room is hosted here.
pub async fn room_stream(
    state: &SharedState,
    code: &str,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, ServiceError> {
    let code = room_code::normalize(code)
        .ok_or_else(|| ServiceError::InvalidInput(format!("`{code}` is not a room code")))?;
    let subscription = state.store().subscribe(&paths::room(&code)).await?;
    if subscription.borrow().is_none() {
        return Err(ServiceError::NotFound(format!("room {code}")));
    }
    let host_events = state.hosted(&code).map(|room| room.events().subscribe());

    info!(room = %code, hosted = host_events.is_some(), "new room SSE connection");
    Ok(to_sse_stream(code, subscription, host_events))
}

/// Convert the room subscription and host events into an SSE response,
/// forwarding until the client disconnects or the room goes away.
fn to_sse_stream(
    code: String,
    mut subscription: Subscription,
    mut host_events: Option<broadcast::Receiver<ServerEvent>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut pending: Vec<ServerEvent> = sse_events::handshake(&code, host_events.is_some())
            .into_iter()
            .collect();
        if let Some(room) = subscription.borrow_and_update().clone() {
            pending.extend(sse_events::room_snapshot(room));
        }

        'forward: loop {
            for payload in pending.drain(..) {
                if tx.send(Ok(to_event(payload))).await.is_err() {
                    break 'forward;
                }
            }

            tokio::select! {
                _ = tx.closed() => break,
                changed = subscription.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = subscription.borrow_and_update().clone();
                    match current {
                        Some(room) => pending.extend(sse_events::room_snapshot(room)),
                        None => {
                            debug!(room = %code, "room document removed");
                            let _ = tx.send(Ok(to_event(sse_events::room_closed(&code)))).await;
                            break;
                        }
                    }
                }
                recv_result = next_host_event(&mut host_events) => {
                    match recv_result {
                        Ok(payload) => pending.push(payload),
                        Err(RecvError::Closed) => host_events = None,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged messages but keep the stream alive.
                            debug!(room = %code, skipped, "room SSE stream lagged");
                        }
                    }
                }
            }
        }

        info!(room = %code, "room SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn next_host_event(
    receiver: &mut Option<broadcast::Receiver<ServerEvent>>,
) -> Result<ServerEvent, RecvError> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}
