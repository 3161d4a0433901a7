use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a `Host` operation.
pub type HostResult<T> = Result<T, HostError>;

/// The crate-spanning error a [`crate::Host`] raises, wrapping every
/// component crate's own error with `#[from]` into a single flat enum.
#[derive(pretty_error_debug::Debug, Error)]
pub enum HostError {
    /// A virtual filesystem error.
    #[error("vfs error: {0}")]
    Vfs(#[from] vfs::VfsError),

    /// An OCI image cache or registry error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// A module resolution error.
    #[error("resolve error: {0}")]
    Resolve(#[from] resolve::ResolveError),

    /// A sandbox rejection.
    #[error("sandbox error: {0}")]
    Sandbox(#[from] sandbox::SandboxError),

    /// A deferred task error.
    #[error("deferred error: {0}")]
    Deferred(#[from] deferred::DeferredError),

    /// A parameter tree error.
    #[error("params error: {0}")]
    Params(#[from] params::ParamsError),

    /// A plugin library error.
    #[error("plugin error: {0}")]
    Plugin(#[from] plugin::PluginError),

    /// An I/O error not otherwise attributable to a component crate.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A `clap` argument parsing error, surfaced from the CLI entry point.
    #[error("argument error: {0}")]
    Args(#[from] clap::Error),

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

impl HostError {
    /// Creates a new `Err` result from any error type.
    pub fn custom(error: impl Into<anyhow::Error>) -> HostError {
        HostError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// This error's cross-cutting category, delegating to the wrapped
    /// component error where one is defined.
    pub fn kind(&self) -> vfs::ErrorKind {
        match self {
            HostError::Vfs(inner) => inner.kind(),
            HostError::Sandbox(inner) => inner.kind(),
            HostError::Resolve(inner) => inner.kind(),
            HostError::Image(_) => vfs::ErrorKind::Transport,
            HostError::Deferred(_) => vfs::ErrorKind::Cancelled,
            HostError::Params(_) => vfs::ErrorKind::Malformed,
            HostError::Plugin(_) => vfs::ErrorKind::Transport,
            HostError::Io(_) | HostError::Args(_) | HostError::Custom(_) => vfs::ErrorKind::Internal,
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
