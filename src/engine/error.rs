//! Error types shared across the engine.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by engine operations.
///
/// Messages carry the originating operation so propagated errors read as
/// a stack of contexts.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("uninitialized: {0}")]
    Uninitialized(String),

    #[error("not initialized: {0}")]
    NotInitialized(String),

    #[error("no matching action for '{node}': {message}")]
    NoMatch { node: String, message: String },

    #[error("bad diff: {0}")]
    BadDiff(String),

    #[error("node '{node}' has no parent relation '{relation}'")]
    UnknownRelation { node: String, relation: String },

    #[error("instantiation failed for '{node}': {message}")]
    InstantiationFailed { node: String, message: String },

    #[error("execution failed in '{node}': {message}")]
    ExecutionFailed { node: String, message: String },

    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    #[error("{0}")]
    Unknown(String),
}

impl EngineError {
    /// Prefix the error message with a propagation context, keeping the kind.
    pub fn forward(self, origin: &str) -> Self {
        match self {
            EngineError::NotFound(m) => EngineError::NotFound(format!("{origin}: {m}")),
            EngineError::AlreadyExists(m) => EngineError::AlreadyExists(format!("{origin}: {m}")),
            EngineError::Uninitialized(m) => EngineError::Uninitialized(format!("{origin}: {m}")),
            EngineError::NotInitialized(m) => {
                EngineError::NotInitialized(format!("{origin}: {m}"))
            }
            EngineError::NoMatch { node, message } => EngineError::NoMatch {
                node,
                message: format!("{origin}: {message}"),
            },
            EngineError::BadDiff(m) => EngineError::BadDiff(format!("{origin}: {m}")),
            EngineError::UnknownRelation { .. } => self,
            EngineError::InstantiationFailed { node, message } => {
                EngineError::InstantiationFailed {
                    node,
                    message: format!("{origin}: {message}"),
                }
            }
            EngineError::ExecutionFailed { node, message } => EngineError::ExecutionFailed {
                node,
                message: format!("{origin}: {message}"),
            },
            EngineError::SizeMismatch(m) => EngineError::SizeMismatch(format!("{origin}: {m}")),
            EngineError::Unknown(m) => EngineError::Unknown(format!("{origin}: {m}")),
        }
    }
}
