use std::sync::Arc;

use async_trait::async_trait;
use vfs::{Filesystem, Location};

use crate::{Candidate, Importer, Resolution, ResolveError, ResolveResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const STD_PREFIX: &str = "@jkcfg/std";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Resolves `@jkcfg/std[...]` specifiers against the embedded standard
/// library filesystem.
///
/// `filesystem` is expected to already carry the `@jkcfg/std` qualify
/// prefix (see [`vfs::implementations::Prefixed::internal`]), so a
/// resolved location's qualified path reads `@jkcfg/std/index.js` rather
/// than needing this importer to know about prefixing.
///
/// Modules not listed in `public_modules` can still be imported by other
/// modules that are themselves inside the standard library's own
/// namespace (detected by the importing module's base location already
/// being rooted in `filesystem`); this is how the standard library's own
/// internals can depend on one another without exposing those internals
/// to user scripts.
#[derive(Debug)]
pub struct StdImporter {
    filesystem: Arc<dyn Filesystem>,
    public_modules: Vec<String>,
}

impl StdImporter {
    /// Builds a std-library importer over `filesystem`, exposing only
    /// `public_modules` to non-std referrers.
    pub fn new(
        filesystem: Arc<dyn Filesystem>,
        public_modules: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            filesystem,
            public_modules: public_modules.into_iter().map(Into::into).collect(),
        }
    }

    fn is_public(&self, module: &str) -> bool {
        self.public_modules.iter().any(|m| m == module)
    }
}

fn module_path(specifier: &str) -> String {
    let rest = specifier.trim_start_matches(STD_PREFIX).trim_start_matches('/');
    if rest.is_empty() {
        "index.js".to_string()
    } else if rest.ends_with(".js") {
        rest.to_string()
    } else {
        format!("{rest}.js")
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Importer for StdImporter {
    async fn import(&self, base: &Location, specifier: &str) -> ResolveResult<Resolution> {
        if !specifier.starts_with(STD_PREFIX) {
            return Ok(Resolution::NotFound(Vec::new()));
        }

        let module = module_path(specifier);
        let referrer_is_std = base.qualify().starts_with(STD_PREFIX);

        if !referrer_is_std && !self.is_public(&module) {
            return Err(ResolveError::NotPublic(specifier.to_string()));
        }

        let path = format!("/{module}");
        match self.filesystem.open(&path).await {
            Ok(_) => Ok(Resolution::Resolved(Location::new(self.filesystem.clone(), path))),
            Err(vfs::VfsError::NotFound(_)) => {
                Ok(Resolution::NotFound(vec![Candidate::new(path, "std lookup")]))
            }
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs::implementations::{Memory, Prefixed};

    fn std_fs(path: &str, contents: &str) -> Arc<dyn Filesystem> {
        Arc::new(Prefixed::internal(
            STD_PREFIX,
            Arc::new(Memory::new(path, contents.as_bytes().to_vec())),
        ))
    }

    #[tokio::test]
    async fn resolves_bare_specifier_to_index_js_when_public() {
        let fs = std_fs("/index.js", "export default {};");
        let importer = StdImporter::new(fs, ["index.js"]);
        let base = Location::nowhere();

        match importer.import(&base, STD_PREFIX).await.unwrap() {
            Resolution::Resolved(location) => {
                assert_eq!(location.qualify(), "@jkcfg/std/index.js");
            }
            Resolution::NotFound(_) => panic!("expected resolution"),
        }
    }

    #[tokio::test]
    async fn denies_non_public_module_from_non_std_referrer() {
        let fs = std_fs("/internal.js", "export default {};");
        let importer = StdImporter::new(fs, Vec::<String>::new());
        let base = Location::nowhere();

        assert!(matches!(
            importer.import(&base, "@jkcfg/std/internal").await,
            Err(ResolveError::NotPublic(_))
        ));
    }

    #[tokio::test]
    async fn allows_non_public_module_from_std_referrer() {
        let fs = std_fs("/internal.js", "export default {};");
        let importer = StdImporter::new(fs.clone(), Vec::<String>::new());
        let base = Location::new(fs, "/other.js");

        assert!(matches!(
            importer.import(&base, "@jkcfg/std/internal").await.unwrap(),
            Resolution::Resolved(_)
        ));
    }
}
