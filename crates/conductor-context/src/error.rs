use thiserror::Error;

/// Errors raised while resolving templated config against a `PipelineContext`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TemplateError {
    #[error("query string contains a template placeholder, which is not allowed: {0}")]
    DisallowedTemplate(String),

    #[error("invalid path expression: {0}")]
    InvalidPath(String),
}
