use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    implementations::{clean_path, split_base},
    DirEntry, EntryKind, File, Filesystem, Metadata, VfsError, VfsResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const WHITEOUT_PREFIX: &str = ".wh.";
const OPAQUE_WHITEOUT_NAME: &str = ".wh..wh..opq";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A stack of filesystems presented as one, uppermost layer first.
///
/// `Overlay` implements the OCI image-layer union: a path is resolved by
/// walking the layers top to bottom and returning the first hit; a
/// directory hit is merged with matching directories in every layer below
/// it, subject to whiteouts.
///
/// A layer hides an entry `name` in its own directory by carrying a
/// sibling file `.wh.<name>` (the entry itself need not also exist in that
/// layer — the deletion marker alone is enough to stop the search). A
/// layer can hide an entire directory's contents in every layer below it
/// by carrying `.wh..wh..opq` inside that directory; merging then stops at
/// that layer. Whiteout markers are never themselves addressable or
/// listed.
#[derive(Debug)]
pub struct Overlay {
    layers: Vec<Arc<dyn Filesystem>>,
}

impl Overlay {
    /// Builds an overlay from layers given uppermost first. Returns
    /// [`VfsError::EmptyOverlay`] if `layers` is empty.
    pub fn new(layers: Vec<Arc<dyn Filesystem>>) -> VfsResult<Self> {
        if layers.is_empty() {
            return Err(VfsError::EmptyOverlay);
        }
        Ok(Self { layers })
    }

    /// Whether `layer` hides `cleaned` from every layer below it, either
    /// because its parent carries a `.wh.<base>` marker for it directly,
    /// or because the path descends from a directory that same layer has
    /// marked opaque (`.wh..wh..opq`), which erases the whole subtree.
    async fn is_whited_out(&self, layer: &Arc<dyn Filesystem>, cleaned: &str) -> VfsResult<bool> {
        let (parent, base) = split_base(cleaned);
        if base.is_empty() {
            return Ok(false);
        }
        let marker = format!("{WHITEOUT_PREFIX}{base}");
        if let Ok(File::Directory { entries, .. }) = layer.open(parent).await {
            if entries.iter().any(|entry| entry.name == marker) {
                return Ok(true);
            }
        }

        let mut ancestor = parent;
        loop {
            if let Ok(File::Directory { entries, .. }) = layer.open(ancestor).await {
                if entries.iter().any(|entry| entry.name == OPAQUE_WHITEOUT_NAME) {
                    return Ok(true);
                }
            }
            if ancestor.is_empty() || ancestor == "/" {
                break;
            }
            let (next, _) = split_base(ancestor);
            if next == ancestor {
                break;
            }
            ancestor = next;
        }

        Ok(false)
    }

    async fn merge_directory(&self, start: usize, cleaned: &str) -> VfsResult<File> {
        let mut merged: BTreeMap<String, DirEntry> = BTreeMap::new();
        let mut deleted: std::collections::HashSet<String> = std::collections::HashSet::new();

        for layer in &self.layers[start..] {
            let entries = match layer.open(cleaned).await {
                Ok(File::Directory { entries, .. }) => entries,
                Ok(File::Regular { .. }) => break,
                Err(_) => continue,
            };

            let opaque = entries.iter().any(|entry| entry.name == OPAQUE_WHITEOUT_NAME);

            for entry in entries {
                if entry.name == OPAQUE_WHITEOUT_NAME {
                    continue;
                }
                if let Some(name) = entry.name.strip_prefix(WHITEOUT_PREFIX) {
                    deleted.insert(name.to_string());
                    continue;
                }
                if deleted.contains(&entry.name) || merged.contains_key(&entry.name) {
                    continue;
                }
                merged.insert(entry.name.clone(), entry);
            }

            if opaque {
                break;
            }
        }

        Ok(File::Directory {
            metadata: Metadata {
                kind: EntryKind::Directory,
                len: 0,
            },
            entries: merged.into_values().collect(),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Filesystem for Overlay {
    async fn open(&self, path: &str) -> VfsResult<File> {
        let cleaned = clean_path(path);
        let (_, base) = split_base(&cleaned);
        if base.starts_with(WHITEOUT_PREFIX) {
            return Err(VfsError::WhiteoutNotAddressable(cleaned));
        }

        for (index, layer) in self.layers.iter().enumerate() {
            match layer.open(&cleaned).await {
                Ok(File::Regular { metadata, contents }) => {
                    return Ok(File::Regular { metadata, contents })
                }
                Ok(File::Directory { .. }) => return self.merge_directory(index, &cleaned).await,
                Err(VfsError::NotFound(_)) => {
                    if self.is_whited_out(layer, &cleaned).await? {
                        return Err(VfsError::NotFound(path.to_string()));
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Err(VfsError::NotFound(path.to_string()))
    }

    fn qualify(&self, path: &str) -> String {
        self.layers[0].qualify(path)
    }

    fn is_internal(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implementations::Native;
    use tempfile::TempDir;
    use tokio::fs;

    async fn layer(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, contents) in files {
            let full = dir.path().join(path.trim_start_matches('/'));
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).await.unwrap();
            }
            fs::write(full, contents.as_bytes()).await.unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn whiteout_hides_file_and_filters_readdir() {
        let upper = layer(&[("dir/.wh.foo", ""), ("dir/bar", "ok")]).await;
        let lower = layer(&[("dir/foo", "hidden"), ("dir/bar", "old")]).await;

        let overlay = Overlay::new(vec![
            Arc::new(Native::new(upper.path().to_path_buf())),
            Arc::new(Native::new(lower.path().to_path_buf())),
        ])
        .unwrap();

        assert!(matches!(
            overlay.open("/dir/foo").await,
            Err(VfsError::NotFound(_))
        ));

        let bar = overlay.open("/dir/bar").await.unwrap();
        assert_eq!(bar.contents(), Some(&b"ok"[..]));

        let dir = overlay.open("/dir").await.unwrap();
        let names: Vec<_> = dir.entries().unwrap().iter().map(|e| &e.name).collect();
        assert_eq!(names, vec!["bar"]);
    }

    #[tokio::test]
    async fn opaque_whiteout_hides_entire_lower_directory() {
        let upper = layer(&[("dir/.wh..wh..opq", ""), ("dir/new", "new")]).await;
        let lower = layer(&[("dir/old", "old")]).await;

        let overlay = Overlay::new(vec![
            Arc::new(Native::new(upper.path().to_path_buf())),
            Arc::new(Native::new(lower.path().to_path_buf())),
        ])
        .unwrap();

        let dir = overlay.open("/dir").await.unwrap();
        let names: Vec<_> = dir.entries().unwrap().iter().map(|e| &e.name).collect();
        assert_eq!(names, vec!["new"]);
    }

    #[tokio::test]
    async fn opaque_whiteout_hides_descendant_file_opened_directly() {
        let upper = layer(&[("dir/.wh..wh..opq", "")]).await;
        let lower = layer(&[("dir/sub/old", "old")]).await;

        let overlay = Overlay::new(vec![
            Arc::new(Native::new(upper.path().to_path_buf())),
            Arc::new(Native::new(lower.path().to_path_buf())),
        ])
        .unwrap();

        assert!(matches!(
            overlay.open("/dir/sub/old").await,
            Err(VfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn whiteout_marker_itself_is_not_addressable() {
        let upper = layer(&[("dir/.wh.foo", "")]).await;
        let overlay =
            Overlay::new(vec![Arc::new(Native::new(upper.path().to_path_buf()))]).unwrap();

        assert!(matches!(
            overlay.open("/dir/.wh.foo").await,
            Err(VfsError::WhiteoutNotAddressable(_))
        ));
    }
}
