use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a parameter-tree operation.
pub type ParamsResult<T> = Result<T, ParamsError>;

/// An error raised while loading or navigating a [`crate::ParamTree`].
#[derive(pretty_error_debug::Debug, Error)]
pub enum ParamsError {
    /// A parameter file's bytes failed to decode as JSON.
    #[error("malformed JSON parameter file: {0}")]
    Json(#[from] serde_json::Error),

    /// A parameter file's bytes failed to decode as YAML.
    #[error("malformed YAML parameter file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `key=value` line in a `.params`-style file had no `=`.
    #[error("malformed key=value parameter line: {0:?}")]
    MalformedKeyValue(String),

    /// The parameter file's extension isn't one this loader recognizes.
    #[error("unrecognized parameter file extension: {0:?}")]
    UnrecognizedFormat(String),

    /// An underlying virtual filesystem error.
    #[error("vfs error: {0}")]
    Vfs(#[from] vfs::VfsError),

    /// Any other error, wrapped for contexts that don't have a dedicated
    /// variant.
    #[error(transparent)]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ParamsError {
    /// Creates a new `Err` result from any error type.
    pub fn custom(error: impl Into<anyhow::Error>) -> ParamsError {
        ParamsError::Custom(AnyError {
            error: error.into(),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
