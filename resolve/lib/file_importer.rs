use std::sync::Arc;

use async_trait::async_trait;
use vfs::{Filesystem, Location};

use crate::{file_resolution::resolve_file_or_index, Importer, Relative, Resolution, ResolveResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Resolves module-style specifiers (not `./`/`../`) rooted at the top of
/// a fixed filesystem, regardless of the importing module's own location.
///
/// A specifier `foo/bar` is tried, in order, as `/foo/bar`,
/// `/foo/bar.mjs`, `/foo/bar.js`, `/foo/bar/index.mjs`,
/// `/foo/bar/index.js`.
#[derive(Debug)]
pub struct FileImporter {
    filesystem: Arc<dyn Filesystem>,
}

impl FileImporter {
    /// Builds a file importer rooted at `filesystem`.
    pub fn new(filesystem: Arc<dyn Filesystem>) -> Self {
        Self { filesystem }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Importer for FileImporter {
    async fn import(&self, _base: &Location, specifier: &str) -> ResolveResult<Resolution> {
        if Relative::is_relative(specifier) {
            return Ok(Resolution::NotFound(Vec::new()));
        }

        let path = if specifier.starts_with('/') {
            specifier.to_string()
        } else {
            format!("/{specifier}")
        };

        let (found, candidates) = resolve_file_or_index(&self.filesystem, &path).await?;
        Ok(match found {
            Some(path) => Resolution::Resolved(Location::new(self.filesystem.clone(), path)),
            None => Resolution::NotFound(candidates),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs::implementations::Native;
    use tempfile::TempDir;

    #[tokio::test]
    async fn resolves_verbatim_and_extension_guessed_paths() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("mod.js"), b"export default 1;")
            .await
            .unwrap();

        let importer = FileImporter::new(Arc::new(Native::new(dir.path().to_path_buf())));
        let base = Location::nowhere();

        match importer.import(&base, "mod").await.unwrap() {
            Resolution::Resolved(location) => assert_eq!(location.path, "/mod.js"),
            Resolution::NotFound(_) => panic!("expected resolution"),
        }
    }

    #[tokio::test]
    async fn ignores_relative_specifiers() {
        let dir = TempDir::new().unwrap();
        let importer = FileImporter::new(Arc::new(Native::new(dir.path().to_path_buf())));
        let base = Location::nowhere();

        assert!(matches!(
            importer.import(&base, "./mod").await.unwrap(),
            Resolution::NotFound(_)
        ));
    }
}
