use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use tracing::{debug, warn};

use super::AppState;
use crate::auth::AuthUser;

/// Server-sent events carrying every change relevant to the caller.
///
/// Each SSE message has the change name as its `event:` field and the
/// tagged JSON document as `data:`.
pub async fn event_stream(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe(auth.id).await;
    let user = auth.id;

    let stream = stream::unfold(rx, move |mut rx| async move {
        let Some(change) = rx.recv().await else {
            debug!(user = %user, "Realtime stream closed");
            return None;
        };
        let event = match change.to_json() {
            Ok(data) => Event::default().event(change.name()).data(data),
            Err(e) => {
                warn!(user = %user, error = %e, "Failed to encode change event");
                Event::default().comment("dropped")
            }
        };
        Some((Ok(event), rx))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
