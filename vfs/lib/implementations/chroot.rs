use std::sync::Arc;

use async_trait::async_trait;

use crate::{implementations::clean_path, join, File, Filesystem, VfsError, VfsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Makes a directory within `inner` appear to be the root of the
/// filesystem.
///
/// Requests that clean to a path starting with `../` are rejected as
/// [`VfsError::NotFound`] rather than being joined under `root` and
/// possibly escaping it.
#[derive(Debug)]
pub struct Chroot {
    inner: Arc<dyn Filesystem>,
    root: String,
}

impl Chroot {
    /// Roots `inner` at `root`.
    pub fn new(inner: Arc<dyn Filesystem>, root: impl Into<String>) -> Self {
        Self {
            inner,
            root: root.into(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Filesystem for Chroot {
    async fn open(&self, path: &str) -> VfsResult<File> {
        let cleaned = clean_path(path);
        if cleaned.starts_with("../") || cleaned == ".." {
            return Err(VfsError::NotFound(path.to_string()));
        }
        self.inner.open(&join(&self.root, &cleaned)).await
    }

    fn qualify(&self, path: &str) -> String {
        self.inner.qualify(&join(&self.root, path))
    }

    fn is_internal(&self) -> bool {
        self.inner.is_internal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implementations::Native;
    use tempfile::TempDir;
    use tokio::fs;

    #[tokio::test]
    async fn rejects_escape_above_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("proj")).await.unwrap();
        fs::write(dir.path().join("secret"), b"nope").await.unwrap();
        fs::write(dir.path().join("proj/ok.js"), b"ok").await.unwrap();

        let native = Arc::new(Native::new(dir.path().to_path_buf()));
        let rooted = Chroot::new(native, "/proj");

        assert!(rooted.open("/ok.js").await.is_ok());
        assert!(matches!(
            rooted.open("../secret").await,
            Err(VfsError::NotFound(_))
        ));
    }
}
