use std::sync::Arc;

use async_trait::async_trait;

use crate::{File, Filesystem, VfsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Wraps a filesystem so its qualified paths carry a prefix and its
/// internal-ness is fixed, independent of the inner filesystem.
///
/// `Prefixed` is how the standard library (internal, prefix `@jkcfg/std`)
/// and an opened OCI image (user, prefix `<ref>!`) present themselves to
/// the resolver and the dependency recorder: `open`/`readdir` delegate
/// straight through, only `qualify` and `is_internal` change.
#[derive(Debug)]
pub struct Prefixed {
    inner: Arc<dyn Filesystem>,
    prefix: String,
    internal: bool,
}

impl Prefixed {
    /// Wraps `inner` as a user filesystem (subject to dependency
    /// recording) whose qualified paths are prefixed with `prefix`.
    pub fn user(prefix: impl Into<String>, inner: Arc<dyn Filesystem>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
            internal: false,
        }
    }

    /// Wraps `inner` as an internal filesystem (excluded from dependency
    /// recording) whose qualified paths are prefixed with `prefix`.
    pub fn internal(prefix: impl Into<String>, inner: Arc<dyn Filesystem>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
            internal: true,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Filesystem for Prefixed {
    async fn open(&self, path: &str) -> VfsResult<File> {
        self.inner.open(path).await
    }

    fn qualify(&self, path: &str) -> String {
        format!("{}{}", self.prefix, self.inner.qualify(path))
    }

    fn is_internal(&self) -> bool {
        self.internal
    }
}
