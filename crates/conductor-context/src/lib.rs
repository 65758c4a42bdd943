//! # conductor-context
//!
//! The dataflow object threaded through a single pipeline execution, and the
//! small path-and-template sub-language used to resolve values between
//! steps.

pub mod context;
pub mod error;
pub mod response_writer;
pub mod template;
pub mod value;

pub use context::{PipelineContext, META_EXECUTION_ID, META_HTTP_REQUEST, META_HTTP_RESPONSE_WRITER, META_RESPONSE_HANDLED};
pub use error::TemplateError;
pub use response_writer::HttpResponseWriter;
pub use template::TemplateEngine;
pub use value::Value;
