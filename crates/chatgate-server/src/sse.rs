// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! SSE Responder (spec §4.5): wraps a [`StreamEvent`] receiver in axum's
//! `Sse` response type with the headers, heartbeat, and frame/terminator
//! shape the spec calls for. `axum::response::sse::KeepAlive` already
//! guarantees the one property spec §5/§8 insists on — the heartbeat timer
//! is cancelled on every exit path, because it lives inside the same
//! stream the client's disconnect tears down — so this module only adds
//! the headers axum doesn't set by default and the per-dialect terminator
//! frame.

use std::convert::Infallible;
use std::time::Duration;

use axum::http::header::{CACHE_CONTROL, CONNECTION};
use axum::http::HeaderValue;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chatgate_proto::StreamEvent;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Turns a channel of decoded upstream events into a stream of SSE `Event`s
/// by applying a dialect's per-event renderer, then appending a literal
/// terminator frame (OpenAI's `[DONE]`) when one is given. Anthropic and
/// Gemini emit their own closing frame (`message_stop`, nothing) as part of
/// the renderer's own `Done` handling, so they pass `terminator: None`.
pub fn frame_stream(
    rx: mpsc::Receiver<StreamEvent>,
    mut render: impl FnMut(&StreamEvent) -> Vec<Value> + Send + 'static,
    terminator: Option<String>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let body = ReceiverStream::new(rx)
        .flat_map(move |event| stream::iter(render(&event).into_iter().map(|v| Ok(Event::default().data(v.to_string())))));
    match terminator {
        Some(text) => body.chain(stream::once(async move { Ok(Event::default().data(text)) })).boxed(),
        None => body.boxed(),
    }
}

/// Wraps `stream` as a full SSE `Response`: axum's `Sse` type for the body
/// plus the headers spec §4.5 requires beyond `Content-Type` (which `Sse`
/// sets itself) — `Cache-Control: no-cache`, `Connection: keep-alive`, and
/// `X-Accel-Buffering: no` to stop an intermediary proxy from buffering the
/// stream.
pub fn sse_response(
    stream: impl Stream<Item = Result<Event, Infallible>> + Send + 'static,
    heartbeat: Duration,
) -> Response {
    let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(heartbeat).text("heartbeat"));
    let mut response = sse.into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_proto::FinishReason;
    use futures::StreamExt as _;

    #[tokio::test]
    async fn terminator_is_appended_after_the_last_rendered_frame() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(StreamEvent::Text { text: "hi".into() }).await.unwrap();
        tx.send(StreamEvent::Done { finish_reason: FinishReason::Stop }).await.unwrap();
        drop(tx);

        let stream = frame_stream(
            rx,
            |event| match event {
                StreamEvent::Text { text } => vec![serde_json::json!({"t": text})],
                StreamEvent::Done { .. } => vec![],
                _ => vec![],
            },
            Some("[DONE]".into()),
        );
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn no_terminator_when_dialect_supplies_its_own_closing_frame() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(StreamEvent::Done { finish_reason: FinishReason::Stop }).await.unwrap();
        drop(tx);

        let stream = frame_stream(rx, |_| vec![serde_json::json!({"type": "message_stop"})], None);
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
    }
}
