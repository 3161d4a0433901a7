use thiserror::Error;
use vfs::ErrorKind;

use crate::Candidate;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a module resolution operation.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// An error raised while resolving a module specifier.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No importer resolved the specifier. Carries every path tried, in
    /// order, so the embedder can report exactly what was looked for.
    #[error("cannot resolve module {specifier:?}\ncandidates considered:\n{}", format_candidates(candidates))]
    NotFound {
        /// The specifier that could not be resolved.
        specifier: String,
        /// Every candidate path considered, across all importers.
        candidates: Vec<Candidate>,
    },

    /// A `@jkcfg/std` module was requested from a referrer outside the
    /// standard library, and the module is not publicly exposed.
    #[error("module {0:?} is not a public standard library module")]
    NotPublic(String),

    /// An npm-style specifier was absolute, which node-module resolution
    /// never permits.
    #[error("absolute import path {0:?} is not allowed")]
    AbsoluteSpecifier(String),

    /// An underlying virtual filesystem error.
    #[error("vfs error: {0}")]
    Vfs(#[from] vfs::VfsError),
}

fn format_candidates(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| format!("    {} ({})", c.path, c.rule))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ResolveError {
    /// This error's cross-cutting category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::NotFound { .. } => ErrorKind::NotFound,
            ResolveError::NotPublic(_) => ErrorKind::Forbidden,
            ResolveError::AbsoluteSpecifier(_) => ErrorKind::Forbidden,
            ResolveError::Vfs(inner) => inner.kind(),
        }
    }
}
