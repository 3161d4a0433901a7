use std::sync::Arc;

use serde_json::json;
use tracing::trace;
use vfs::{Location, OperationKind, Recorder};

use crate::{file_resolution::dirname, Importer, Resolution, ResolveError, ResolveResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Resolves ES module specifiers by trying a fixed chain of [`Importer`]s
/// in order, relative to a current base [`Location`].
///
/// A `Resolver` is immutable; resolving a specifier produces the bytes of
/// the winning module, its canonical location, and a *new* `Resolver`
/// whose base is that location's directory — the one the caller should
/// use for resolving that module's own nested imports, mirroring the way
/// the embedded script engine expects a fresh resolution callback per
/// nested `LoadModule` call.
#[derive(Clone)]
pub struct Resolver {
    base: Location,
    importers: Arc<Vec<Arc<dyn Importer>>>,
    recorder: Option<Arc<Recorder>>,
}

impl Resolver {
    /// Builds a resolver rooted at `base`, trying `importers` in order.
    pub fn new(base: Location, importers: Vec<Arc<dyn Importer>>) -> Self {
        Self {
            base,
            importers: Arc::new(importers),
            recorder: None,
        }
    }

    /// Attaches a recorder; non-internal import resolutions will be
    /// appended to it as `import-file` operations.
    pub fn with_recorder(mut self, recorder: Arc<Recorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// The location new imports are currently resolved relative to.
    pub fn base(&self) -> &Location {
        &self.base
    }

    /// Returns a resolver identical to this one but trying `importer`
    /// first, ahead of every importer already in the chain.
    ///
    /// Used to wire a one-off [`crate::StaticImporter`] for a specific
    /// call to [`Self::resolve`] (the entry script, whose specifier isn't
    /// known when the chain is first built) without disturbing the chain
    /// every other specifier resolves through.
    pub fn with_importer(&self, importer: Arc<dyn Importer>) -> Self {
        let mut importers = Vec::with_capacity(self.importers.len() + 1);
        importers.push(importer);
        importers.extend(self.importers.iter().cloned());

        Self {
            base: self.base.clone(),
            importers: Arc::new(importers),
            recorder: self.recorder.clone(),
        }
    }

    /// Resolves `specifier`, trying every importer in declared order and
    /// stopping at the first that resolves. Returns the module's bytes,
    /// its canonical location, and a resolver scoped to that location's
    /// directory for resolving its nested imports.
    #[tracing::instrument(skip(self), fields(specifier))]
    pub async fn resolve(&self, specifier: &str) -> ResolveResult<(Vec<u8>, Location, Resolver)> {
        let mut candidates = Vec::new();

        for importer in self.importers.iter() {
            match importer.import(&self.base, specifier).await? {
                Resolution::Resolved(location) => {
                    trace!(specifier, path = %location.qualify(), "resolved");

                    let file = location.open().await?;
                    let bytes = file.contents().map(<[u8]>::to_vec).ok_or_else(|| {
                        ResolveError::Vfs(vfs::VfsError::custom(anyhow::anyhow!(
                            "resolved module {:?} is a directory",
                            location.path
                        )))
                    })?;

                    if !location.filesystem.is_internal() {
                        if let Some(recorder) = &self.recorder {
                            recorder.record(
                                OperationKind::ImportFile,
                                [
                                    ("specifier", json!(specifier)),
                                    ("path", json!(location.qualify())),
                                ],
                            );
                        }
                    }

                    let next_base = Location::new(location.filesystem.clone(), dirname(&location.path));
                    let next = Self {
                        base: next_base,
                        importers: self.importers.clone(),
                        recorder: self.recorder.clone(),
                    };

                    return Ok((bytes, location, next));
                }
                Resolution::NotFound(mut considered) => candidates.append(&mut considered),
            }
        }

        trace!(specifier, candidate_count = candidates.len(), "no importer resolved specifier");

        Err(ResolveError::NotFound {
            specifier: specifier.to_string(),
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileImporter, Relative, StdImporter};
    use vfs::implementations::{Memory, Native, Prefixed};

    #[tokio::test]
    async fn scenario_a_resolution_chain() {
        let project = tempfile::TempDir::new().unwrap();
        tokio::fs::write(project.path().join("script.js"), b"// entry")
            .await
            .unwrap();
        let project_fs: Arc<dyn vfs::Filesystem> =
            Arc::new(Native::new(project.path().to_path_buf()));

        let std_fs: Arc<dyn vfs::Filesystem> = Arc::new(Prefixed::internal(
            "@jkcfg/std",
            Arc::new(Memory::new("/index.js", b"export default {};".to_vec())),
        ));

        let importers: Vec<Arc<dyn Importer>> = vec![
            Arc::new(Relative),
            Arc::new(StdImporter::new(std_fs, ["index.js"])),
            Arc::new(FileImporter::new(project_fs.clone())),
        ];

        let base = Location::new(project_fs, "/");
        let resolver = Resolver::new(base, importers);

        let (bytes, location, _next) = resolver.resolve("@jkcfg/std").await.unwrap();
        assert_eq!(bytes, b"export default {};");
        assert_eq!(location.qualify(), "@jkcfg/std/index.js");
    }

    #[tokio::test]
    async fn reports_every_candidate_on_total_failure() {
        let project = tempfile::TempDir::new().unwrap();
        let project_fs: Arc<dyn vfs::Filesystem> =
            Arc::new(Native::new(project.path().to_path_buf()));
        let base = Location::new(project_fs.clone(), "/");
        let importers: Vec<Arc<dyn Importer>> = vec![Arc::new(FileImporter::new(project_fs))];
        let resolver = Resolver::new(base, importers);

        let err = resolver.resolve("missing").await.unwrap_err();
        match err {
            ResolveError::NotFound { candidates, .. } => assert!(!candidates.is_empty()),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
