//! Server-sent event stream of hub events.
//!
//! Each hub event becomes one SSE message named after its `event_type`. When
//! no traffic arrives for 30 seconds a `ping` event with an empty object is
//! emitted so intermediaries keep the connection alive. Client disconnect
//! drops the stream, which unsubscribes the queue.

use crate::context::AppContext;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use btc_arb_streams::Subscription;
use futures_util::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// Idle interval before a keepalive ping.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// `GET /stream`
pub async fn stream(
    State(ctx): State<Arc<AppContext>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = ctx.hub.subscribe();
    Sse::new(event_stream(subscription))
}

fn event_stream(
    subscription: Subscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures_util::stream::unfold(subscription, |mut subscription| async move {
        match tokio::time::timeout(PING_INTERVAL, subscription.recv()).await {
            Ok(Some(event)) => {
                let sse = Event::default()
                    .event(event.event_type.clone())
                    .json_data(&event)
                    .unwrap_or_else(|_| Event::default().event("error").data("{}"));
                Some((Ok(sse), subscription))
            }
            // Hub is gone; end the stream.
            Ok(None) => None,
            Err(_) => Some((Ok(Event::default().event("ping").data("{}")), subscription)),
        }
    })
}
