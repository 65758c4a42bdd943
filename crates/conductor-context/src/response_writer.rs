//! `HttpResponseWriter` — the handle a pipeline step uses to complete the
//! inbound HTTP request that triggered the run.
//!
//! `Value` has no JSON-safe way to carry a live connection handle, so this
//! lives as its own typed slot on `PipelineContext` rather than inside
//! `Metadata`. The reserved `_http_response_writer` metadata key still marks
//! its *presence* for steps that only need to check whether a writer was
//! installed.

use async_trait::async_trait;

use crate::value::Value;

#[async_trait]
pub trait HttpResponseWriter: Send + Sync {
    async fn write(&self, status: u16, headers: Vec<(String, String)>, body: Value);
}
