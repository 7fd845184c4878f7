//! Re-encodes the upstream completion stream as the outbound event channel
//! consumed by the widget: one `data: {"text": …}` frame per text delta, a
//! `[DONE]` sentinel on clean completion, and a single `{"error": …}` frame
//! (then close, no sentinel) if the upstream fails mid-stream.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures_util::{Stream, StreamExt};
use serde_json::json;
use tracing::warn;

use crate::completion::CompletionEvent;

pub const DONE_SENTINEL: &str = "[DONE]";

/// User-facing message for any upstream failure. Raw error detail stays in
/// the server logs.
pub const UPSTREAM_ERROR_MESSAGE: &str =
    "Désolé, je rencontre un problème technique. Pouvez-vous réessayer ou écrire à contact.eco.btp.deal@gmail.com ?";

/// Turn the decoded upstream events into outbound frame payloads (the part
/// after `data:`). Exactly one frame per delta, in arrival order.
pub fn relay_frames<S>(upstream: S) -> impl Stream<Item = String>
where
    S: Stream<Item = anyhow::Result<CompletionEvent>>,
{
    async_stream::stream! {
        futures_util::pin_mut!(upstream);

        while let Some(event) = upstream.next().await {
            match event {
                Ok(CompletionEvent::TextDelta(text)) => {
                    yield json!({ "text": text }).to_string();
                }
                Ok(CompletionEvent::Done) => break,
                Err(e) => {
                    warn!(error = %e, "upstream completion stream failed mid-flight");
                    yield json!({ "error": UPSTREAM_ERROR_MESSAGE }).to_string();
                    // Close without the sentinel: the channel must never stay
                    // open after an upstream failure.
                    return;
                }
            }
        }

        yield DONE_SENTINEL.to_string();
    }
}

/// Same stream wrapped as axum SSE events.
pub fn sse_events<S>(upstream: S) -> impl Stream<Item = Result<Event, Infallible>>
where
    S: Stream<Item = anyhow::Result<CompletionEvent>>,
{
    relay_frames(upstream).map(|frame| Ok(Event::default().data(frame)))
}
