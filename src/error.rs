use thiserror::Error;

/// The closed error taxonomy that crosses the pipeline's public boundary.
///
/// No other variant is ever returned from a public `Pipeline` method.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("bad argument: {0}")]
    BadArg(String),

    #[error("ring buffer is full")]
    QueueFull,

    #[error("allocation failed: {0}")]
    OutOfMemory(String),

    #[error("operation failed: {0}")]
    Failed(String),
}

impl PipelineError {
    pub(crate) fn bad_arg(msg: impl Into<String>) -> Self {
        PipelineError::BadArg(msg.into())
    }

    pub(crate) fn failed(msg: impl Into<String>) -> Self {
        PipelineError::Failed(msg.into())
    }
}
