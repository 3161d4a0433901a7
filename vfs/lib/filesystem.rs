use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::VfsResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file, readable as a byte stream.
    File,

    /// A directory, whose contents can be listed.
    Directory,
}

/// A name within a directory listing. Never contains a path separator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    /// The entry's bare name.
    pub name: String,

    /// Whether the entry is itself a directory.
    pub kind: EntryKind,
}

/// Metadata describing a file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Whether this entry is a file or a directory.
    pub kind: EntryKind,

    /// Size in bytes. Zero for directories.
    pub len: u64,
}

impl Metadata {
    /// Returns `true` if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Returns `true` if this entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// A file or directory handle returned by [`Filesystem::open`].
///
/// The core is read-only, so a `File` carries its whole content rather than
/// a streaming handle: module bytes and sandboxed reads are both bounded by
/// the size of a single source file.
#[derive(Debug, Clone)]
pub enum File {
    /// A regular file and its contents.
    Regular {
        /// File metadata.
        metadata: Metadata,
        /// The file's full contents.
        contents: Vec<u8>,
    },

    /// A directory and its (already-merged, where applicable) entries.
    Directory {
        /// Directory metadata.
        metadata: Metadata,
        /// The directory's entries, deduplicated by name.
        entries: Vec<DirEntry>,
    },
}

impl File {
    /// Returns the metadata for this file or directory.
    pub fn metadata(&self) -> &Metadata {
        match self {
            File::Regular { metadata, .. } => metadata,
            File::Directory { metadata, .. } => metadata,
        }
    }

    /// Returns the contents of a regular file, or `None` for a directory.
    pub fn contents(&self) -> Option<&[u8]> {
        match self {
            File::Regular { contents, .. } => Some(contents),
            File::Directory { .. } => None,
        }
    }

    /// Returns the entries of a directory, or `None` for a regular file.
    pub fn entries(&self) -> Option<&[DirEntry]> {
        match self {
            File::Directory { entries, .. } => Some(entries),
            File::Regular { .. } => None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A read-only capability for navigating a tree of files.
///
/// `Filesystem` is the unit of composition for the module search path: the
/// standard library, a chroot-ed project directory, and an OCI image
/// overlay are all just different `Filesystem` implementations, and can be
/// combined (`Prefixed`, `Chroot`, `Overlay`) without any of them knowing
/// about the others.
#[async_trait]
pub trait Filesystem: Send + Sync + fmt::Debug {
    /// Opens the file or directory at `path`, or returns
    /// [`crate::VfsError::NotFound`] if nothing exists there.
    async fn open(&self, path: &str) -> VfsResult<File>;

    /// Returns a canonical string identifying `path` within this
    /// filesystem, used both for module locations and dependency
    /// recording.
    fn qualify(&self, path: &str) -> String;

    /// Whether this filesystem is internal to the host (the standard
    /// library, magic modules). Internal filesystems are excluded from
    /// dependency recording.
    fn is_internal(&self) -> bool;
}

//--------------------------------------------------------------------------------------------------
// Location
//--------------------------------------------------------------------------------------------------

/// A path within a specific filesystem: the canonical identity of a loaded
/// module or a resolved sandbox read/write target.
#[derive(Debug, Clone)]
pub struct Location {
    /// The filesystem the path is rooted in.
    pub filesystem: Arc<dyn Filesystem>,

    /// The path within that filesystem.
    pub path: String,
}

impl Location {
    /// Builds a new location.
    pub fn new(filesystem: Arc<dyn Filesystem>, path: impl Into<String>) -> Self {
        Self {
            filesystem,
            path: path.into(),
        }
    }

    /// The distinguished "not resolved" sentinel. Used as the resolved
    /// location of an importer that didn't find anything.
    pub fn nowhere() -> Self {
        Self {
            filesystem: crate::implementations::EMPTY.clone(),
            path: String::new(),
        }
    }

    /// Whether this location is the [`Location::nowhere`] sentinel.
    pub fn is_nowhere(&self) -> bool {
        self.path.is_empty()
            && Arc::ptr_eq(
                &self.filesystem,
                &(crate::implementations::EMPTY.clone() as Arc<dyn Filesystem>),
            )
    }

    /// The canonical qualified path, combining the filesystem's qualify
    /// with this location's path.
    pub fn qualify(&self) -> String {
        self.filesystem.qualify(&self.path)
    }

    /// Opens this location.
    pub async fn open(&self) -> VfsResult<File> {
        self.filesystem.open(&self.path).await
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        let clean = |p: &str| crate::implementations::clean_path(p);
        Arc::ptr_eq(&self.filesystem, &other.filesystem) && clean(&self.path) == clean(&other.path)
    }
}
