use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;
use vfs::ErrorKind;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of an image-cache or registry operation.
pub type ImageResult<T> = Result<T, ImageError>;

/// An error that occurred while parsing a reference, talking to a
/// registry, or materializing an image in the cache.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ImageError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred while parsing an image reference string.
    #[error("invalid image reference: {0}")]
    InvalidReference(String),

    /// The registry returned no manifest matching the requested platform.
    #[error("no manifest found matching the requested platform")]
    ManifestNotFound,

    /// A downloaded blob's digest did not match the one named in the
    /// manifest.
    #[error("({repository}@{digest}) downloaded blob hash {actual} does not match expected hash")]
    DigestMismatch {
        /// The repository the blob belongs to.
        repository: String,
        /// The digest that was expected.
        digest: String,
        /// The digest actually computed from the downloaded bytes.
        actual: String,
    },

    /// A manifest named a layer whose directory is missing from the cache.
    #[error("layer is not in image cache: {0}")]
    LayerNotInCache(String),

    /// An HTTP request to a registry failed.
    #[error("registry request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// An HTTP middleware (retry policy) error.
    #[error("registry middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// The registry's `WWW-Authenticate` challenge could not be parsed.
    #[error("unsupported authentication challenge: {0}")]
    UnsupportedAuthChallenge(String),

    /// The registry returned an error body instead of the requested
    /// resource.
    #[error("registry error: {0}")]
    Registry(String),

    /// A `serde_json` (de)serialization error.
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// A `walkdir` traversal error, raised while copy-merging a layer.
    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// An error constructing the virtual overlay filesystem over cached
    /// layers.
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

impl ImageError {
    /// Creates a new `Err` result from any error type.
    pub fn custom(error: impl Into<anyhow::Error>) -> ImageError {
        ImageError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// This error's cross-cutting category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImageError::ManifestNotFound | ImageError::LayerNotInCache(_) => ErrorKind::NotFound,
            ImageError::InvalidReference(_) | ImageError::SerdeJson(_) => ErrorKind::Malformed,
            ImageError::DigestMismatch { .. } => ErrorKind::Malformed,
            ImageError::HttpRequest(_)
            | ImageError::HttpMiddleware(_)
            | ImageError::UnsupportedAuthChallenge(_)
            | ImageError::Registry(_) => ErrorKind::Transport,
            ImageError::Io(_) | ImageError::WalkDir(_) => ErrorKind::Internal,
            ImageError::Vfs(inner) => inner.kind(),
            ImageError::Custom(_) => ErrorKind::Internal,
        }
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
