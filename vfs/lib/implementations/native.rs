use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::{DirEntry, EntryKind, File, Filesystem, Metadata, VfsError, VfsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A filesystem backed by a real directory on the host OS.
///
/// Virtual paths are `/`-separated and always treated as relative to
/// `root`; a leading `/` is stripped before joining. `Native` never looks
/// outside `root` on its own — combine it with [`crate::implementations::Chroot`]
/// or [`crate::sandbox`](../../../sandbox)-level checks for that.
#[derive(Debug)]
pub struct Native {
    root: PathBuf,
}

impl Native {
    /// Roots a filesystem at the given host directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn host_path(&self, path: &str) -> PathBuf {
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            self.root.clone()
        } else {
            self.root.join(trimmed)
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Filesystem for Native {
    async fn open(&self, path: &str) -> VfsResult<File> {
        let host_path = self.host_path(path);
        let meta = fs::metadata(&host_path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                VfsError::NotFound(path.to_string())
            } else {
                VfsError::Io(err)
            }
        })?;

        if meta.is_dir() {
            let entries = read_dir_entries(&host_path).await?;
            Ok(File::Directory {
                metadata: Metadata {
                    kind: EntryKind::Directory,
                    len: 0,
                },
                entries,
            })
        } else {
            let contents = fs::read(&host_path).await?;
            Ok(File::Regular {
                metadata: Metadata {
                    kind: EntryKind::File,
                    len: contents.len() as u64,
                },
                contents,
            })
        }
    }

    fn qualify(&self, path: &str) -> String {
        self.host_path(path).to_string_lossy().into_owned()
    }

    fn is_internal(&self) -> bool {
        false
    }
}

async fn read_dir_entries(host_path: &Path) -> VfsResult<Vec<DirEntry>> {
    let mut read_dir = fs::read_dir(host_path).await?;
    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let file_type = entry.file_type().await?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        entries.push(DirEntry { name, kind });
    }

    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn opens_file_and_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), b"content").await.unwrap();
        fs::create_dir(dir.path().join("sub")).await.unwrap();

        let native = Native::new(dir.path().to_path_buf());

        let file = native.open("/a.js").await.unwrap();
        assert_eq!(file.contents(), Some(&b"content"[..]));

        let root = native.open("/").await.unwrap();
        let entries = root.entries().unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let native = Native::new(dir.path().to_path_buf());
        assert!(matches!(
            native.open("/missing.js").await,
            Err(VfsError::NotFound(_))
        ));
    }
}
