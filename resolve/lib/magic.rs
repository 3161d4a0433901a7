use std::sync::Arc;

use async_trait::async_trait;
use vfs::{implementations::Memory, Location};

use crate::{Importer, Resolution, ResolveError, ResolveResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const STD_PREFIX: &str = "@jkcfg/std";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An importer that matches one exact specifier and synthesizes its
/// module body on the fly, rather than reading it from a filesystem.
///
/// Used for modules that don't exist on disk at all — a sandbox's
/// generated `resource(...)` shim, for instance — where the body depends
/// on the importing module's own location (`base`), not just the
/// specifier.
///
/// Unless `public` is set, the specifier only resolves for a referrer
/// already inside the `@jkcfg/std` namespace (detected the same way
/// [`crate::StdImporter`] detects it: the importing module's own base
/// location is qualified under that prefix); any other referrer gets
/// [`ResolveError::NotPublic`].
pub struct MagicImporter {
    specifier: String,
    public: bool,
    generate: Arc<dyn Fn(&Location) -> Vec<u8> + Send + Sync>,
}

impl MagicImporter {
    /// Builds a magic importer that matches `specifier` exactly and
    /// generates its content from the importing module's location.
    /// Unless `public`, only a referrer inside `@jkcfg/std` may import it.
    pub fn new(
        specifier: impl Into<String>,
        public: bool,
        generate: impl Fn(&Location) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        Self {
            specifier: specifier.into(),
            public,
            generate: Arc::new(generate),
        }
    }
}

impl std::fmt::Debug for MagicImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagicImporter")
            .field("specifier", &self.specifier)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Importer for MagicImporter {
    async fn import(&self, base: &Location, specifier: &str) -> ResolveResult<Resolution> {
        if specifier != self.specifier {
            return Ok(Resolution::NotFound(Vec::new()));
        }

        let referrer_is_std = base.qualify().starts_with(STD_PREFIX);
        if !self.public && !referrer_is_std {
            return Err(ResolveError::NotPublic(specifier.to_string()));
        }

        let contents = (self.generate)(base);
        let path = format!("resource:{}", base.qualify());
        let filesystem = Arc::new(Memory::new(path.clone(), contents));

        Ok(Resolution::Resolved(Location::new(filesystem, path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_for_referrer_inside_std_namespace_even_when_not_public() {
        let importer = MagicImporter::new("@jkcfg/std/resource", false, |_base| b"export default 1;".to_vec());
        let base = Location::new(Arc::new(vfs::implementations::Empty), "@jkcfg/std/readbase.js");

        let resolution = importer.import(&base, "@jkcfg/std/resource").await.unwrap();
        assert!(matches!(resolution, Resolution::Resolved(_)));
    }

    #[tokio::test]
    async fn denies_non_std_referrer_when_not_public() {
        let importer = MagicImporter::new("@jkcfg/std/resource", false, |_base| b"export default 1;".to_vec());
        let base = Location::new(Arc::new(vfs::implementations::Empty), "/project/script.js");

        assert!(matches!(
            importer.import(&base, "@jkcfg/std/resource").await,
            Err(ResolveError::NotPublic(_))
        ));
    }

    #[tokio::test]
    async fn allows_any_referrer_when_public() {
        let importer = MagicImporter::new("@jkcfg/resource", true, |_base| b"export default 1;".to_vec());
        let base = Location::new(Arc::new(vfs::implementations::Empty), "/project/script.js");

        let resolution = importer.import(&base, "@jkcfg/resource").await.unwrap();
        assert!(matches!(resolution, Resolution::Resolved(_)));
    }

    #[tokio::test]
    async fn does_not_match_other_specifiers() {
        let importer = MagicImporter::new("@jkcfg/resource", true, |_base| b"export default 1;".to_vec());
        let base = Location::new(Arc::new(vfs::implementations::Empty), "/project/script.js");

        assert!(matches!(
            importer.import(&base, "@jkcfg/other").await.unwrap(),
            Resolution::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn synthetic_path_matches_mint_convention() {
        let importer = MagicImporter::new("@jkcfg/resource", true, |_base| b"export default 1;".to_vec());
        let fs: Arc<dyn vfs::Filesystem> = Arc::new(vfs::implementations::Native::new(std::path::PathBuf::from("/proj")));
        let base = Location::new(fs, "/sub");

        match importer.import(&base, "@jkcfg/resource").await.unwrap() {
            Resolution::Resolved(location) => assert_eq!(location.qualify(), "resource:/sub"),
            Resolution::NotFound(_) => panic!("expected resolution"),
        }
    }
}
