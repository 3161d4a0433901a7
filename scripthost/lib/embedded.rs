//! The standard-library module tree, compiled into the `scripthost` binary
//! rather than read from disk.

use std::collections::BTreeSet;

use async_trait::async_trait;
use rust_embed::RustEmbed;
use vfs::{implementations::clean_path, DirEntry, EntryKind, File, Filesystem, Metadata, VfsError, VfsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The standard library's JavaScript sources, embedded at compile time.
///
/// Files live under `std/` next to this crate's `Cargo.toml`; adding a
/// module there makes it part of the binary without any runtime asset
/// directory to ship alongside it.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/std"]
struct StdAssets;

/// A [`Filesystem`] over a [`RustEmbed`]-generated asset bundle.
///
/// Always reports itself internal: embedded assets are never subject to
/// dependency recording, the same as magic modules synthesized at
/// runtime.
#[derive(Debug, Clone, Copy)]
pub struct Embedded;

impl Embedded {
    /// Builds the filesystem serving the embedded standard library.
    pub fn new() -> Self {
        Self
    }

    fn key_for(path: &str) -> String {
        clean_path(path).trim_start_matches('/').to_string()
    }
}

impl Default for Embedded {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Filesystem for Embedded {
    async fn open(&self, path: &str) -> VfsResult<File> {
        let key = Self::key_for(path);

        if let Some(file) = StdAssets::get(&key) {
            let contents = file.data.into_owned();
            return Ok(File::Regular {
                metadata: Metadata {
                    kind: EntryKind::File,
                    len: contents.len() as u64,
                },
                contents,
            });
        }

        let dir_prefix = if key.is_empty() { String::new() } else { format!("{key}/") };
        let mut names = BTreeSet::new();
        let mut found_dir = dir_prefix.is_empty();
        for asset in StdAssets::iter() {
            let asset = asset.as_ref();
            if let Some(rest) = asset.strip_prefix(&dir_prefix) {
                found_dir = true;
                let name = rest.split('/').next().unwrap_or(rest);
                if !name.is_empty() {
                    names.insert(name.to_string());
                }
            }
        }

        if !found_dir {
            return Err(VfsError::NotFound(path.to_string()));
        }

        let entries = names
            .into_iter()
            .map(|name| {
                let child_prefix = format!("{dir_prefix}{name}/");
                let kind = if StdAssets::iter().any(|asset| asset.as_ref().starts_with(&child_prefix)) {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                DirEntry { name, kind }
            })
            .collect();

        Ok(File::Directory {
            metadata: Metadata {
                kind: EntryKind::Directory,
                len: 0,
            },
            entries,
        })
    }

    fn qualify(&self, path: &str) -> String {
        format!("/{}", Self::key_for(path))
    }

    fn is_internal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_the_embedded_index_module() {
        let fs = Embedded::new();
        let file = fs.open("/index.js").await.unwrap();
        assert!(file.contents().is_some());
    }

    #[tokio::test]
    async fn missing_module_is_not_found() {
        let fs = Embedded::new();
        assert!(matches!(fs.open("/does-not-exist.js").await, Err(VfsError::NotFound(_))));
    }

    #[tokio::test]
    async fn is_always_internal() {
        assert!(Embedded::new().is_internal());
    }
}
