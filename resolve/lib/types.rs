use async_trait::async_trait;
use vfs::Location;

use crate::ResolveResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A path considered while resolving a specifier, paired with the name of
/// the rule that produced it (e.g. `"./foo.js -> ./foo.js"`,
/// `"./foo -> ./foo/index"`, `"via NPM resolution"`). Collected so a
/// failed resolution can report every path it tried and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The path that was tried.
    pub path: String,
    /// The name of the rule that produced this candidate.
    pub rule: String,
}

impl Candidate {
    /// Builds a candidate.
    pub fn new(path: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            rule: rule.into(),
        }
    }
}

/// The outcome of a single importer's attempt to resolve a specifier:
/// either it found nothing (but may have tried candidates worth
/// reporting), or it resolved to a location.
pub enum Resolution {
    /// The importer has nothing to say about this specifier; try the
    /// next one. Carries any candidates it checked along the way.
    NotFound(Vec<Candidate>),

    /// The importer resolved the specifier.
    Resolved(Location),
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// One strategy for turning an import specifier into a [`Location`].
///
/// The resolver tries its importers in order, accumulating candidates
/// from every `NotFound` result, and stops at the first `Resolved`.
#[async_trait]
pub trait Importer: Send + Sync {
    /// Attempts to resolve `specifier`, relative to `base` (the
    /// resolved location of the module doing the importing).
    async fn import(&self, base: &Location, specifier: &str) -> ResolveResult<Resolution>;
}
