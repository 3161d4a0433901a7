use thiserror::Error;
use vfs::ErrorKind;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a sandboxed path resolution.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// An error raised while resolving a sandboxed read or write path.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// An absolute path was given where the sandbox requires a relative
    /// one.
    #[error("reading or writing absolute paths is forbidden: {0:?}")]
    AbsolutePath(String),

    /// A cleaned path started with `..`, attempting to escape its base.
    #[error("path escapes its sandbox base: {0:?}")]
    Escape(String),

    /// A module presented a capability token the sandbox has no record
    /// of.
    #[error("unknown module access token")]
    UnknownToken,

    /// A module's capability token does not grant write access, but a
    /// write was attempted.
    #[error("module is not permitted to write to the host filesystem")]
    WriteNotPermitted,

    /// An underlying virtual filesystem error.
    #[error("vfs error: {0}")]
    Vfs(#[from] vfs::VfsError),
}

impl SandboxError {
    /// This error's cross-cutting category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::AbsolutePath(_)
            | SandboxError::Escape(_)
            | SandboxError::UnknownToken
            | SandboxError::WriteNotPermitted => ErrorKind::Forbidden,
            SandboxError::Vfs(inner) => inner.kind(),
        }
    }
}
