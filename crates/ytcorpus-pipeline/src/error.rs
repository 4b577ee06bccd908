//! Pipeline error types.

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while resolving or running a pipeline (spec §4.4, §4.5).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A target step, or one of its transitive dependencies, forms a cycle.
    #[error("circular dependency detected involving step '{0}'")]
    CircularDependency(String),

    /// A target step or dependency name has no registration.
    #[error("unknown step '{0}'")]
    UnknownStep(String),

    /// A second step registered under a name that is already taken.
    #[error("step '{0}' is already registered")]
    DuplicateStep(String),

    #[error("archive error: {0}")]
    Archive(#[from] ytcorpus_archive::ArchiveError),
}
