use std::path::PathBuf;

use thiserror::Error;

use crate::partial::Shape;

/// Error type for configuration, variant lookup, and partial-value decoding.
#[derive(Debug, Error)]
pub enum JobStatsError {
    #[error("unknown analysis variant '{0}'")]
    UnknownVariant(String),
    #[error("failed to load config from {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
    #[error("malformed {shape} partial value: '{encoded}'")]
    MalformedPartial { shape: Shape, encoded: String },
    #[error("cannot merge {left} partial value with {right}")]
    ShapeMismatch { left: Shape, right: Shape },
}
