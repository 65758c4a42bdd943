//! `GET /api/v1/executions/{id}/stream` — the HTTP surface over `SSETracer`.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use crate::tracer::SSETracer;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Handler for `GET /api/v1/executions/{id}/stream`.
///
/// `400` when `id` is empty. Streaming itself never fails server-side — the
/// underlying transport either supports it or the connection simply can't be
/// established, which axum surfaces before this handler runs. Each event is
/// rendered through `SSEEvent::to_wire` so the JSON-encoded-whole-event
/// fallback for an empty `data` applies on the wire, not just in tests.
pub async fn stream_execution(
    State(tracer): State<SSETracer>,
    Path(id): Path<String>,
) -> Response {
    if id.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing execution id").into_response();
    }

    let events = tracer.subscribe(id).map(|event| event.to_wire());
    let keep_alive = IntervalStream::new(tokio::time::interval(KEEP_ALIVE_INTERVAL)).map(|_| ": keep-alive\n\n".to_string());
    let wire = events.merge(keep_alive).map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk)));

    let mut response = Body::from_stream(wire).into_response();
    let headers = response.headers_mut();
    headers.insert("Content-Type", HeaderValue::from_static("text/event-stream"));
    insert_streaming_headers(headers);
    response
}

fn insert_streaming_headers(headers: &mut HeaderMap) {
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));
    headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
}
