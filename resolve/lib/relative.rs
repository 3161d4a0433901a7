use async_trait::async_trait;
use vfs::{implementations::join, Location};

use crate::{file_resolution::resolve_file_or_index, Importer, Resolution, ResolveResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Resolves specifiers beginning with `./` or `../` relative to the
/// importing module's directory, within the importing module's own
/// filesystem.
///
/// `Relative` never crosses into another filesystem (an OCI image layer
/// can `import "./sibling.js"` from within itself, but not escape into
/// the native project tree), since it joins the specifier against
/// `base`'s own filesystem rather than a fixed root.
#[derive(Debug, Default)]
pub struct Relative;

impl Relative {
    /// Returns whether `specifier` is the kind of path this importer
    /// handles.
    pub fn is_relative(specifier: &str) -> bool {
        specifier.starts_with("./") || specifier.starts_with("../")
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Importer for Relative {
    async fn import(&self, base: &Location, specifier: &str) -> ResolveResult<Resolution> {
        if !Self::is_relative(specifier) {
            return Ok(Resolution::NotFound(Vec::new()));
        }

        let joined = join(&base.path, specifier);
        let (found, candidates) = resolve_file_or_index(&base.filesystem, &joined).await?;

        Ok(match found {
            Some(path) => Resolution::Resolved(Location::new(base.filesystem.clone(), path)),
            None => Resolution::NotFound(candidates),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vfs::implementations::Native;

    use super::*;

    #[tokio::test]
    async fn joins_against_the_base_directory_not_one_above_it() {
        let project = tempfile::TempDir::new().unwrap();
        tokio::fs::create_dir(project.path().join("a")).await.unwrap();
        tokio::fs::write(project.path().join("a").join("b.js"), b"// b").await.unwrap();
        tokio::fs::write(project.path().join("a").join("c.js"), b"// c").await.unwrap();

        let fs: Arc<dyn vfs::Filesystem> = Arc::new(Native::new(project.path().to_path_buf()));
        // A module resolved at /a/b.js leaves its own nested imports with a
        // base already rebased to its directory, /a — not /a/b.js itself.
        let base = Location::new(fs, "/a");

        match Relative.import(&base, "./c").await.unwrap() {
            Resolution::Resolved(location) => assert_eq!(location.path, "/a/c.js"),
            Resolution::NotFound(candidates) => panic!("expected a match, considered {candidates:?}"),
        }
    }
}
