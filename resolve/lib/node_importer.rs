use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use vfs::{File, Filesystem, Location};

use crate::{
    file_resolution::{resolve_file, resolve_index},
    Candidate, Importer, Relative, Resolution, ResolveError, ResolveResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Resolves bare specifiers by walking `node_modules` directories the way
/// Node.js does for CommonJS, adapted for ES modules: only `.mjs`/`.js`
/// extensions are tried, and a `package.json`'s `module` field (rather
/// than `main`) names the entry point.
///
/// Walks `base`'s path from deepest to root; at each level that isn't
/// itself named `node_modules`, tries `<level>/node_modules/<specifier>`.
#[derive(Debug)]
pub struct NodeImporter {
    filesystem: Arc<dyn Filesystem>,
}

#[derive(Deserialize)]
struct PackageManifest {
    module: Option<String>,
}

impl NodeImporter {
    /// Builds a node-style importer rooted at `filesystem`.
    pub fn new(filesystem: Arc<dyn Filesystem>) -> Self {
        Self { filesystem }
    }

    async fn load_as_path(&self, path: &str) -> ResolveResult<(Option<String>, Vec<Candidate>)> {
        let (found, mut candidates) = resolve_file(&self.filesystem, path).await?;
        if found.is_some() {
            return Ok((found, candidates));
        }

        match self.filesystem.open(path).await {
            Ok(File::Directory { .. }) => {
                let (dir_found, dir_candidates) = self.load_as_dir(path).await?;
                candidates.extend(dir_candidates);
                Ok((dir_found, candidates))
            }
            _ => Ok((None, candidates)),
        }
    }

    async fn load_as_dir(&self, dir: &str) -> ResolveResult<(Option<String>, Vec<Candidate>)> {
        let mut candidates = Vec::new();

        let package_json_path = format!("{dir}/package.json");
        if let Ok(File::Regular { contents, .. }) = self.filesystem.open(&package_json_path).await {
            if let Ok(manifest) = serde_json::from_slice::<PackageManifest>(&contents) {
                if let Some(module) = manifest.module {
                    let module_path = format!("{dir}/{module}");

                    let (found, module_candidates) = resolve_file(&self.filesystem, &module_path).await?;
                    candidates.extend(qualify(module_candidates, &format!("via .module in {package_json_path}")));
                    if found.is_some() {
                        return Ok((found, candidates));
                    }

                    let (found, index_candidates) = resolve_index(&self.filesystem, &module_path).await?;
                    candidates.extend(qualify(index_candidates, &format!("via .module in {package_json_path}")));
                    if found.is_some() {
                        return Ok((found, candidates));
                    }
                }
            }
        }

        let (found, index_candidates) = resolve_index(&self.filesystem, dir).await?;
        candidates.extend(index_candidates);
        Ok((found, candidates))
    }

    async fn load_as_module(&self, specifier: &str, base_path: &str) -> ResolveResult<(Option<String>, Vec<Candidate>)> {
        let mut candidates = Vec::new();
        let segments: Vec<&str> = base_path.split('/').filter(|s| !s.is_empty()).collect();

        for i in (0..=segments.len()).rev() {
            if i > 0 && segments[i - 1] == "node_modules" {
                continue;
            }
            let mut path_segments = segments[..i].to_vec();
            path_segments.push("node_modules");
            path_segments.push(specifier);
            let path = format!("/{}", path_segments.join("/"));

            let (found, path_candidates) = self.load_as_path(&path).await?;
            candidates.extend(path_candidates);
            if found.is_some() {
                return Ok((found, qualify(candidates, "via NPM resolution")));
            }
        }

        Ok((None, qualify(candidates, "via NPM resolution")))
    }
}

fn qualify(candidates: Vec<Candidate>, extra: &str) -> Vec<Candidate> {
    candidates
        .into_iter()
        .map(|c| Candidate::new(c.path, format!("{}, {extra}", c.rule)))
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Importer for NodeImporter {
    async fn import(&self, base: &Location, specifier: &str) -> ResolveResult<Resolution> {
        if Relative::is_relative(specifier) {
            return Ok(Resolution::NotFound(Vec::new()));
        }
        if specifier.starts_with('/') {
            return Err(ResolveError::AbsoluteSpecifier(specifier.to_string()));
        }

        let (found, candidates) = self.load_as_module(specifier, &base.path).await?;
        Ok(match found {
            Some(path) => Resolution::Resolved(Location::new(self.filesystem.clone(), path)),
            None => Resolution::NotFound(candidates),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    #[tokio::test]
    async fn resolves_package_json_module_field() {
        let dir = tempfile::TempDir::new().unwrap();
        let modfoo = dir.path().join("node_modules/modfoo");
        fs::create_dir_all(modfoo.join("lib")).await.unwrap();
        fs::write(modfoo.join("package.json"), br#"{"module":"lib/index.mjs"}"#)
            .await
            .unwrap();
        fs::write(modfoo.join("lib/index.mjs"), b"export default 1;")
            .await
            .unwrap();

        let importer = NodeImporter::new(Arc::new(vfs::implementations::Native::new(
            dir.path().to_path_buf(),
        )));
        let base = Location::new(
            Arc::new(vfs::implementations::Native::new(dir.path().to_path_buf())),
            "/",
        );

        match importer.import(&base, "modfoo").await.unwrap() {
            Resolution::Resolved(location) => {
                assert_eq!(location.path, "/node_modules/modfoo/lib/index.mjs")
            }
            Resolution::NotFound(candidates) => panic!("expected resolution, got {candidates:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_absolute_specifiers() {
        let dir = tempfile::TempDir::new().unwrap();
        let importer = NodeImporter::new(Arc::new(vfs::implementations::Native::new(
            dir.path().to_path_buf(),
        )));
        let base = Location::new(
            Arc::new(vfs::implementations::Native::new(dir.path().to_path_buf())),
            "/",
        );

        assert!(matches!(
            importer.import(&base, "/abs").await,
            Err(ResolveError::AbsoluteSpecifier(_))
        ));
    }
}
