//! Run progress streaming via SSE

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde_json::json;
use vgen_core::{RunRegistry, StreamCursor, StreamItem};

struct StreamState {
    cursor: StreamCursor,
    registry: Arc<RunRegistry>,
    poll_interval: Duration,
    pending: VecDeque<StreamItem>,
}

/// Stream a run's events, then a terminal marker. Each SSE `data` line is
/// one JSON object: an event, or a `{status, message}` marker.
pub async fn stream_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if !state.registry().contains(&id) {
        return Err(ApiError::NotFound(format!("Run not found: {id}")));
    }

    let initial = StreamState {
        cursor: StreamCursor::new(id),
        registry: state.registry().clone(),
        poll_interval: state.stream_poll_interval(),
        pending: VecDeque::new(),
    };

    let stream = stream::unfold(initial, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((Ok(to_sse(&item)), st));
            }
            if st.cursor.is_finished() {
                return None;
            }
            let items = st.cursor.poll(&st.registry);
            if items.is_empty() {
                tokio::time::sleep(st.poll_interval).await;
            } else {
                st.pending.extend(items);
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

fn to_sse(item: &StreamItem) -> Event {
    let payload = match item {
        StreamItem::Event(event) => serde_json::to_value(event).unwrap_or_default(),
        StreamItem::WaitingForInput => json!({
            "status": "waiting_for_input",
            "message": "Waiting for human input",
        }),
        StreamItem::Terminal(status) => json!({
            "status": status.as_str(),
            "message": "Run complete",
        }),
        StreamItem::NotFound => json!({
            "status": "error",
            "message": "Run not found",
        }),
    };
    Event::default().data(payload.to_string())
}

