//! # conductor-sse
//!
//! Non-blocking pub/sub hub fanning `SSEEvent`s to HTTP Server-Sent-Events
//! subscribers, per execution id plus a `"*"` wildcard topic.

pub mod event;
pub mod http;
pub mod tracer;

pub use event::SSEEvent;
pub use http::stream_execution;
pub use tracer::{SSETracer, Subscription, WILDCARD_TOPIC};
