//! Event-stream endpoints for live reload.
//!
//! `GET /events` holds one [`Subscription`] per connection and emits a
//! `data: reload` frame per signal. When the client goes away axum drops the
//! stream, which drops the subscription and unsubscribes it.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use futures_util::stream;

use super::hub::Subscription;
use super::inject::CLIENT_SCRIPT;
use crate::state::AppState;

/// Handle `GET /events`.
pub(crate) async fn events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let subscription = state.hub.subscribe();
    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(reload_stream(subscription)).keep_alive(KeepAlive::default()),
    )
}

/// Turn a subscription into a stream of `reload` events.
fn reload_stream(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        subscription.recv().await?;
        Some((Ok(Event::default().data("reload")), subscription))
    })
}

/// Handle `GET /livereload.js`.
pub(crate) async fn livereload_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        CLIENT_SCRIPT,
    )
}
