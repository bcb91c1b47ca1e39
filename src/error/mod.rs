use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error accepted by [`Error::custom`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why an item was refused by a pipeline entry point or a stage queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The entry point was already completed.
    Completed,
    /// A stage failed and the pipeline stopped.
    Faulted,
    /// The pipeline was cancelled.
    Cancelled,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Faulted => f.write_str("faulted"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("build error: {context}")]
    Build { context: String },

    #[error("item rejected: pipeline {0}")]
    Rejected(RejectReason),

    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("stage `{stage}` panicked: {message}")]
    Panicked { stage: &'static str, message: String },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Custom(BoxError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn build(context: impl Into<String>) -> Self {
        Self::Build {
            context: context.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn custom<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Custom(error.into())
    }

    pub fn stage_source(stage: &'static str, source: Error) -> Self {
        Self::Stage {
            stage,
            source: Box::new(source),
        }
    }

    /// Name of the stage that raised this error, if it came from one.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Stage { stage, .. } | Self::Panicked { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error returned by the worker function, with stage wrapping removed.
    pub fn root(&self) -> &Error {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub(crate) fn in_stage(self, stage: &'static str) -> Self {
        match self {
            Self::Panicked { .. } => self,
            other => Self::stage_source(stage, other),
        }
    }
}
