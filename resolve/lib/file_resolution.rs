use std::sync::Arc;

use vfs::{File, Filesystem};

use crate::{Candidate, ResolveResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolves `path` to a regular file: tries it verbatim, then with a
/// `.mjs` suffix, then with a `.js` suffix.
pub(crate) async fn resolve_file(
    filesystem: &Arc<dyn Filesystem>,
    path: &str,
) -> ResolveResult<(Option<String>, Vec<Candidate>)> {
    let mut candidates = Vec::new();

    let attempts = [
        (path.to_string(), "verbatim".to_string()),
        (
            format!("{path}.mjs"),
            format!("{path} -> {path}.mjs"),
        ),
        (format!("{path}.js"), format!("{path} -> {path}.js")),
    ];

    for (candidate_path, rule) in attempts {
        candidates.push(Candidate::new(candidate_path.clone(), rule));
        if let Ok(File::Regular { .. }) = filesystem.open(&candidate_path).await {
            return Ok((Some(candidate_path), candidates));
        }
    }

    Ok((None, candidates))
}

/// Resolves `path` as a directory index: tries `<path>/index.mjs` then
/// `<path>/index.js`.
pub(crate) async fn resolve_index(
    filesystem: &Arc<dyn Filesystem>,
    path: &str,
) -> ResolveResult<(Option<String>, Vec<Candidate>)> {
    let mut candidates = Vec::new();

    for ext in ["mjs", "js"] {
        let index_path = format!("{path}/index.{ext}");
        candidates.push(Candidate::new(
            index_path.clone(),
            format!("{path} -> {path}/index"),
        ));
        if let Ok(File::Regular { .. }) = filesystem.open(&index_path).await {
            return Ok((Some(index_path), candidates));
        }
    }

    Ok((None, candidates))
}

/// Resolves `path` to a regular file, falling back to its directory index
/// if the bare path and its guessed-extension variants all miss.
pub(crate) async fn resolve_file_or_index(
    filesystem: &Arc<dyn Filesystem>,
    path: &str,
) -> ResolveResult<(Option<String>, Vec<Candidate>)> {
    let (found, mut candidates) = resolve_file(filesystem, path).await?;
    if found.is_some() {
        return Ok((found, candidates));
    }

    let (found, index_candidates) = resolve_index(filesystem, path).await?;
    candidates.extend(index_candidates);
    Ok((found, candidates))
}

/// Returns the directory portion of a cleaned virtual path (everything
/// before the last `/`), or the empty string if there is none.
pub(crate) fn dirname(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    }
}
