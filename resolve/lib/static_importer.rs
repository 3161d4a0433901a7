use std::sync::Arc;

use async_trait::async_trait;
use vfs::{implementations::Memory, Location};

use crate::{Importer, Resolution, ResolveResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An importer that matches one exact specifier and serves a single fixed
/// [`Location`], whenever `specifier` is requested exactly.
///
/// Typically used for the entry script handed to `jk run`: [`Self::new`]
/// synthesizes an in-memory location for bytes with no filesystem home of
/// their own (a script piped in on stdin, say), while [`Self::from_location`]
/// wires an already-resolved location on a real filesystem, so that the
/// entry's own relative imports keep resolving against its real directory
/// rather than an ephemeral single-file one.
#[derive(Debug)]
pub struct StaticImporter {
    specifier: String,
    location: Location,
}

impl StaticImporter {
    /// Builds a static importer serving `bytes` at `resolved_path`,
    /// synthesizing a standalone in-memory filesystem for them.
    pub fn new(
        specifier: impl Into<String>,
        resolved_path: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let resolved_path = resolved_path.into();
        let filesystem = Arc::new(Memory::new(resolved_path.clone(), bytes.into()));
        Self::from_location(specifier, Location::new(filesystem, resolved_path))
    }

    /// Builds a static importer serving `location` whenever `specifier` is
    /// requested exactly.
    pub fn from_location(specifier: impl Into<String>, location: Location) -> Self {
        Self {
            specifier: specifier.into(),
            location,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Importer for StaticImporter {
    async fn import(&self, _base: &Location, specifier: &str) -> ResolveResult<Resolution> {
        if specifier != self.specifier {
            return Ok(Resolution::NotFound(Vec::new()));
        }

        Ok(Resolution::Resolved(self.location.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_exact_specifier_only() {
        let importer = StaticImporter::new("entry.js", "entry.js", b"export default 1;".to_vec());
        let base = Location::nowhere();

        match importer.import(&base, "entry.js").await.unwrap() {
            Resolution::Resolved(location) => {
                let file = location.open().await.unwrap();
                assert_eq!(file.contents(), Some(&b"export default 1;"[..]));
            }
            Resolution::NotFound(_) => panic!("expected a match"),
        }

        assert!(matches!(
            importer.import(&base, "other.js").await.unwrap(),
            Resolution::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn from_location_serves_the_given_location_unchanged() {
        let project = tempfile::TempDir::new().unwrap();
        tokio::fs::write(project.path().join("entry.js"), b"entry();\n").await.unwrap();
        let fs: Arc<dyn vfs::Filesystem> = Arc::new(vfs::implementations::Native::new(project.path().to_path_buf()));
        let location = Location::new(fs, "/entry.js");

        let importer = StaticImporter::from_location("__entry__", location.clone());
        let base = Location::nowhere();

        match importer.import(&base, "__entry__").await.unwrap() {
            Resolution::Resolved(resolved) => assert_eq!(resolved.qualify(), location.qualify()),
            Resolution::NotFound(_) => panic!("expected a match"),
        }
    }
}
