//! Server-Sent Events over live queries. The subscription lives as long as
//! the response stream, so a closed connection disposes it.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use futures_util::stream;
use serde::Serialize;
use tracing::{debug, warn};

use crate::live::{AllLists, LiveQuery, Query, TasksForList};
use crate::models::ListId;
use crate::state::AppState;

pub(super) async fn lists(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("live lists stream opened");
    sse(LiveQuery::spawn(state.store, AllLists, ()))
}

pub(super) async fn tasks(
    State(state): State<AppState>,
    Path(id): Path<ListId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("live tasks stream opened for list {}", id);
    sse(LiveQuery::spawn(state.store, TasksForList, Some(id)))
}

fn sse<Q>(live: LiveQuery<Q>) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    Q: Query,
    Q::Output: Serialize,
{
    let events = stream::unfold(live, |mut live| async move {
        let event = match live.next_value().await? {
            Ok(value) => snapshot_event(&value),
            Err(message) => Event::default().event("error").data(message),
        };
        Some((Ok(event), live))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn snapshot_event<T: Serialize>(value: &T) -> Event {
    match Event::default().event("snapshot").json_data(value) {
        Ok(event) => event,
        Err(e) => {
            warn!("failed to encode snapshot: {}", e);
            Event::default().event("error").data("failed to encode snapshot")
        }
    }
}
