use std::sync::{Arc, LazyLock};

use async_trait::async_trait;

use crate::{File, Filesystem, VfsError, VfsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A filesystem with no files. `Empty.open(_)` always fails with
/// [`VfsError::NotFound`]. Used as the backing filesystem for
/// [`crate::Location::nowhere`] and for synthetic locations such as magic
/// modules, which carry no real filesystem of their own.
#[derive(Debug, Default)]
pub struct Empty;

/// The single shared instance of [`Empty`], so that every
/// [`crate::Location::nowhere`] compares equal to every other.
pub static EMPTY: LazyLock<Arc<Empty>> = LazyLock::new(|| Arc::new(Empty));

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Filesystem for Empty {
    async fn open(&self, path: &str) -> VfsResult<File> {
        Err(VfsError::NotFound(path.to_string()))
    }

    fn qualify(&self, path: &str) -> String {
        path.to_string()
    }

    fn is_internal(&self) -> bool {
        true
    }
}
