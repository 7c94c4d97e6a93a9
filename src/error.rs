use std::io;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The builder or a configuration document describes an unusable network.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("shape mismatch in {context}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A label is not a one-hot vector.
    #[error("invalid label: {0}")]
    InvalidLabel(String),

    #[error("weights cannot be updated before a forward pass")]
    NoForwardPass,

    /// A persisted network does not describe a consistent architecture.
    #[error("invalid network state: {0}")]
    State(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Fail with `ShapeMismatch` unless `actual == expected`.
pub(crate) fn check_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            context,
            expected,
            actual,
        })
    }
}
