use std::sync::Arc;

use serde_json::json;
use vfs::{implementations::clean_path, implementations::join, Location, OperationKind, Recorder};

use crate::{ModuleAccessTable, SandboxError, SandboxResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Mediates every path a running script asks to read or write, resolving
/// it against a base location (reads) or a write root (writes) and
/// rejecting anything that would escape them — unless a capability token
/// grants a specific exception.
///
/// A bare relative path is always confined to its base. Absolute paths and
/// `..`-escapes are forbidden by default; a [`crate::ModuleAccess`] with
/// `allow_paths_outside_sandbox` set lifts that restriction for the
/// specific module the token was minted for.
#[derive(Debug, Clone)]
pub struct Sandbox {
    base: Location,
    write_root: Location,
    access: Arc<ModuleAccessTable>,
    recorder: Option<Arc<Recorder>>,
}

impl Sandbox {
    /// Builds a sandbox confined to `base` for reads and `write_root` for
    /// writes, consulting `access` for any token-bearing call.
    pub fn new(base: Location, write_root: Location, access: Arc<ModuleAccessTable>) -> Self {
        Self {
            base,
            write_root,
            access,
            recorder: None,
        }
    }

    /// Attaches a recorder; reads of non-internal filesystems will be
    /// appended to it as `read-file` operations.
    pub fn with_recorder(mut self, recorder: Arc<Recorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Resolves `path` for reading, optionally on behalf of the module
    /// bound to `token`.
    pub fn resolve_for_read(&self, path: &str, token: Option<&str>) -> SandboxResult<Location> {
        let (base, allow_outside) = match token {
            Some(token) => {
                let access = self.access.get(token).ok_or(SandboxError::UnknownToken)?;
                let outside = access.allow_paths_outside_sandbox;
                (access.location, outside)
            }
            None => (self.base.clone(), false),
        };

        let location = if allow_outside {
            if is_absolute(path) {
                Location::new(base.filesystem, clean_path(path))
            } else {
                Location::new(base.filesystem.clone(), join(&base.path, path))
            }
        } else {
            if is_absolute(path) {
                return Err(SandboxError::AbsolutePath(path.to_string()));
            }
            let cleaned = clean_path(path);
            if cleaned.starts_with("..") {
                return Err(SandboxError::Escape(path.to_string()));
            }
            Location::new(base.filesystem.clone(), join(&base.path, path))
        };

        if !location.filesystem.is_internal() {
            if let Some(recorder) = &self.recorder {
                recorder.record(OperationKind::ReadFile, [("path", json!(location.qualify()))]);
            }
        }

        Ok(location)
    }

    /// Resolves `path` for writing, optionally on behalf of the module
    /// bound to `token`.
    pub fn resolve_for_write(&self, path: &str, token: Option<&str>) -> SandboxResult<Location> {
        let allow_outside = match token {
            Some(token) => {
                let access = self.access.get(token).ok_or(SandboxError::UnknownToken)?;
                if !access.allow_write_to_host {
                    return Err(SandboxError::WriteNotPermitted);
                }
                access.allow_paths_outside_sandbox
            }
            None => false,
        };

        if allow_outside {
            return Ok(if is_absolute(path) {
                Location::new(self.write_root.filesystem.clone(), clean_path(path))
            } else {
                Location::new(self.write_root.filesystem.clone(), join(&self.write_root.path, path))
            });
        }

        if is_absolute(path) {
            return Err(SandboxError::AbsolutePath(path.to_string()));
        }
        let cleaned = clean_path(path);
        if cleaned.starts_with("..") {
            return Err(SandboxError::Escape(path.to_string()));
        }
        Ok(Location::new(self.write_root.filesystem.clone(), join(&self.write_root.path, path)))
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs::implementations::Native;

    fn native_sandbox() -> (tempfile::TempDir, tempfile::TempDir, Sandbox) {
        let input = tempfile::TempDir::new().unwrap();
        let output = tempfile::TempDir::new().unwrap();
        let base = Location::new(Arc::new(Native::new(input.path().to_path_buf())), "/");
        let write_root = Location::new(Arc::new(Native::new(output.path().to_path_buf())), "/");
        let sandbox = Sandbox::new(base, write_root, Arc::new(ModuleAccessTable::new()));
        (input, output, sandbox)
    }

    #[test]
    fn rejects_parent_escape_without_token() {
        let (_input, _output, sandbox) = native_sandbox();
        let err = sandbox.resolve_for_read("../etc/passwd", None).unwrap_err();
        assert!(matches!(err, SandboxError::Escape(_)));
    }

    #[test]
    fn rejects_absolute_path_without_token() {
        let (_input, _output, sandbox) = native_sandbox();
        let err = sandbox.resolve_for_read("/etc/passwd", None).unwrap_err();
        assert!(matches!(err, SandboxError::AbsolutePath(_)));
    }

    #[test]
    fn resolves_relative_path_under_base() {
        let (_input, _output, sandbox) = native_sandbox();
        let location = sandbox.resolve_for_read("sub/ok.yaml", None).unwrap();
        assert_eq!(location.path, "/sub/ok.yaml");
    }

    #[test]
    fn token_with_outside_access_escapes_freely() {
        let (input, _output, sandbox) = native_sandbox();
        let sibling = Location::new(Arc::new(Native::new(input.path().to_path_buf())), "/sub");
        let access = crate::ModuleAccess::new(sibling).with_paths_outside_sandbox();
        sandbox.access.insert("tok".to_string(), access);

        let location = sandbox.resolve_for_read("../sibling/a", Some("tok")).unwrap();
        assert_eq!(location.path, "/sibling/a");
    }

    #[test]
    fn unknown_token_fails() {
        let (_input, _output, sandbox) = native_sandbox();
        let err = sandbox.resolve_for_read("a", Some("nope")).unwrap_err();
        assert!(matches!(err, SandboxError::UnknownToken));
    }

    #[test]
    fn write_requires_permission() {
        let (_input, _output, sandbox) = native_sandbox();
        let access = crate::ModuleAccess::new(Location::new(
            Arc::new(Native::new(std::env::temp_dir())),
            "/",
        ));
        sandbox.access.insert("ro".to_string(), access);
        let err = sandbox.resolve_for_write("out.json", Some("ro")).unwrap_err();
        assert!(matches!(err, SandboxError::WriteNotPermitted));
    }

    #[test]
    fn write_resolves_under_write_root() {
        let (_input, _output, sandbox) = native_sandbox();
        let location = sandbox.resolve_for_write("out/result.json", None).unwrap();
        assert_eq!(location.path, "/out/result.json");
    }
}
