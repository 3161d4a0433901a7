use async_trait::async_trait;

use crate::{implementations::clean_path, EntryKind, File, Filesystem, Metadata, VfsError, VfsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A filesystem serving a single in-memory file at a fixed path.
///
/// Used for content that doesn't live on disk at all: a generated magic
/// module, a statically-registered built-in. Always internal — wrap in
/// [`crate::implementations::Prefixed::user`] for content an embedder
/// wants recorded as a dependency anyway.
#[derive(Debug, Clone)]
pub struct Memory {
    path: String,
    contents: Vec<u8>,
}

impl Memory {
    /// Serves `contents` at `path`; any other path is `NotFound`.
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: clean_path(&path.into()),
            contents: contents.into(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Filesystem for Memory {
    async fn open(&self, path: &str) -> VfsResult<File> {
        if clean_path(path) == self.path {
            Ok(File::Regular {
                metadata: Metadata {
                    kind: EntryKind::File,
                    len: self.contents.len() as u64,
                },
                contents: self.contents.clone(),
            })
        } else {
            Err(VfsError::NotFound(path.to_string()))
        }
    }

    fn qualify(&self, path: &str) -> String {
        path.to_string()
    }

    fn is_internal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_its_one_file_and_nothing_else() {
        let fs = Memory::new("/magic/resource.js", b"export default 1;".to_vec());
        let file = fs.open("/magic/resource.js").await.unwrap();
        assert_eq!(file.contents(), Some(&b"export default 1;"[..]));
        assert!(matches!(fs.open("/other.js").await, Err(VfsError::NotFound(_))));
    }
}
