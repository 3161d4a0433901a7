use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a virtual filesystem operation.
pub type VfsResult<T> = Result<T, VfsError>;

/// The cross-cutting category an error falls into, independent of which
/// crate raised it. Lets callers that don't care about the leaf variant —
/// the resolver's candidate aggregation, the sandbox's RPC-facing
/// responses — switch on taxonomy rather than matching every error type
/// in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A path, module, or cache object does not exist.
    NotFound,
    /// A sandbox rejection: absolute path, escape, or missing capability.
    Forbidden,
    /// A manifest, package.json, or parameter file failed to decode.
    Malformed,
    /// A registry fetch, subprocess launch, or plugin RPC failed.
    Transport,
    /// A deferred's context was cancelled or timed out.
    Cancelled,
    /// An invariant was violated.
    Internal,
}

/// An error that occurred while navigating a [`crate::Filesystem`].
#[derive(pretty_error_debug::Debug, Error)]
pub enum VfsError {
    /// The path does not exist in this filesystem.
    #[error("path does not exist: {0}")]
    NotFound(String),

    /// The path exists but is not a directory, where a directory was
    /// required (e.g. readdir on a regular file).
    #[error("path is not a directory: {0}")]
    NotADirectory(String),

    /// An overlay was constructed with zero layers.
    #[error("overlay filesystem requires at least one layer")]
    EmptyOverlay,

    /// A path resolved to a whiteout marker, which is never directly
    /// addressable.
    #[error("path refers to a whiteout marker: {0}")]
    WhiteoutNotAddressable(String),

    /// Underlying I/O error from a native filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

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

impl VfsError {
    /// Creates a new `Err` result from any error type.
    pub fn custom(error: impl Into<anyhow::Error>) -> VfsError {
        VfsError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// This error's cross-cutting category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::NotFound(_) | VfsError::WhiteoutNotAddressable(_) => ErrorKind::NotFound,
            VfsError::NotADirectory(_) | VfsError::EmptyOverlay => ErrorKind::Internal,
            VfsError::Io(_) => ErrorKind::Internal,
            VfsError::Custom(_) => ErrorKind::Internal,
        }
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
