//! The embedded script runtime's contract with the host, and a naive
//! reference implementation that exercises the module resolution chain
//! without any real JavaScript evaluation.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use resolve::Resolver;

use crate::{HostError, HostResult};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A JavaScript runtime capable of loading an ES module graph and running
/// its entry module.
///
/// This core treats the actual engine as an out-of-scope collaborator — no
/// V8/QuickJS FFI is vendored — so this trait only pins down the shape a
/// real embedding would need: given an entry module's bytes, its
/// canonical path, and a [`Resolver`] scoped to it, run the module graph
/// to completion and return whatever bytes the script produced (e.g. its
/// default export, serialized).
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Runs `entry_source` (already resolved, at `entry_path`) to
    /// completion, resolving any further imports through `resolver`.
    async fn run(&self, entry_path: &str, entry_source: Vec<u8>, resolver: Resolver) -> HostResult<Vec<u8>>;
}

//--------------------------------------------------------------------------------------------------
// Naive reference engine
//--------------------------------------------------------------------------------------------------

static IMPORT_SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:[^'"]+?\s+from\s+)?['"]([^'"]+)['"]\s*;?\s*$"#).expect("valid regex")
});

/// A reference [`ScriptEngine`] with no JavaScript evaluation at all: it
/// follows every `import '...'`/`import x from '...'` statement at the
/// top of each module source, in file order, resolving each one through
/// the resolver chain and concatenating every visited module's bytes.
///
/// This exists purely to exercise the resolver end-to-end from the CLI —
/// proving that a real engine's module loader would see the same bytes a
/// genuine V8/QuickJS embedding would request — not to interpret any
/// script semantics.
#[derive(Debug, Default)]
pub struct ConcatenatingEngine;

impl ConcatenatingEngine {
    /// Builds a new naive engine.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptEngine for ConcatenatingEngine {
    async fn run(&self, entry_path: &str, entry_source: Vec<u8>, resolver: Resolver) -> HostResult<Vec<u8>> {
        let mut visited = Vec::new();
        let mut output = Vec::new();
        self.visit(entry_path, entry_source, resolver, &mut visited, &mut output).await?;
        Ok(output)
    }
}

impl ConcatenatingEngine {
    #[async_recursion::async_recursion]
    async fn visit(
        &self,
        path: &str,
        source: Vec<u8>,
        resolver: Resolver,
        visited: &mut Vec<String>,
        output: &mut Vec<u8>,
    ) -> HostResult<()> {
        if visited.iter().any(|v| v == path) {
            return Ok(());
        }
        visited.push(path.to_string());

        let text = String::from_utf8_lossy(&source);
        for capture in IMPORT_SPECIFIER.captures_iter(&text) {
            let specifier = capture[1].to_string();
            let (bytes, location, next) = resolver
                .resolve(&specifier)
                .await
                .map_err(|err| HostError::custom(anyhow::anyhow!(err)))?;
            self.visit(&location.qualify(), bytes, next, visited, output).await?;
        }

        output.extend_from_slice(format!("// --- {path} ---\n").as_bytes());
        output.extend_from_slice(&source);
        output.push(b'\n');
        Ok(())
    }
}
