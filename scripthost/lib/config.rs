//! Layered configuration for a [`crate::Host`]: built-in defaults,
//! environment variable overrides, and finally builder overrides, in
//! that order.

use std::{path::PathBuf, sync::LazyLock};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Directory name nested under a user's home directory for all host state.
pub const HOST_HOME_DIR: &str = ".scripthost";

/// The default OCI registry domain, used when pulling images that don't
/// name one explicitly.
pub const DEFAULT_OCI_REGISTRY: &str = image::DEFAULT_REGISTRY;

/// The default home directory: `~/.scripthost`.
pub static DEFAULT_HOST_HOME: LazyLock<PathBuf> =
    LazyLock::new(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(HOST_HOME_DIR));

/// Environment variable overriding the host home directory.
pub const HOST_HOME_ENV_VAR: &str = "SCRIPTHOST_HOME";

/// Environment variable overriding the OCI registry domain.
pub const OCI_REGISTRY_ENV_VAR: &str = "SCRIPTHOST_OCI_REGISTRY";

/// Environment variable allowing sandboxed reads to follow paths outside
/// the configured root. Any non-empty value enables it.
pub const ALLOW_PATHS_OUTSIDE_SANDBOX_ENV_VAR: &str = "SCRIPTHOST_ALLOW_PATHS_OUTSIDE_SANDBOX";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Settings a [`crate::Host`] is constructed from.
///
/// `cache_dir` is the *parent* of the content-addressed image store —
/// [`image::Cache::new`] joins its own `"jk"` subdirectory onto it, so
/// this must not itself end in `jk`.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Root directory for all per-host state (image cache, plugin
    /// binaries).
    pub home_dir: PathBuf,

    /// Parent directory of the OCI image cache's content store.
    pub cache_dir: PathBuf,

    /// Registry domain used for image references that don't name one.
    pub oci_registry: String,

    /// Directory write-capability tokens are allowed to write into.
    pub write_root: PathBuf,

    /// Whether sandboxed reads may escape the configured root by default.
    pub allow_paths_outside_sandbox: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl HostConfig {
    /// Loads configuration from built-in defaults, overridden by
    /// environment variables.
    pub fn load() -> Self {
        let home_dir = std::env::var(HOST_HOME_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| DEFAULT_HOST_HOME.to_owned());

        let oci_registry =
            std::env::var(OCI_REGISTRY_ENV_VAR).unwrap_or_else(|_| DEFAULT_OCI_REGISTRY.to_string());

        let allow_paths_outside_sandbox = std::env::var(ALLOW_PATHS_OUTSIDE_SANDBOX_ENV_VAR)
            .map(|value| !value.is_empty())
            .unwrap_or(false);

        let cache_dir = home_dir.join("cache");
        let write_root = home_dir.join("work");

        Self {
            home_dir,
            cache_dir,
            oci_registry,
            write_root,
            allow_paths_outside_sandbox,
        }
    }

    /// Overrides the home directory. Does not recompute `cache_dir` or
    /// `write_root` — those were already derived from the previous home
    /// directory in [`HostConfig::load`]; override them too with
    /// [`HostConfig::with_write_root`] or by setting the field directly
    /// if they should move as well.
    pub fn with_home_dir(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = home_dir.into();
        self
    }

    /// Overrides the OCI registry domain.
    pub fn with_oci_registry(mut self, oci_registry: impl Into<String>) -> Self {
        self.oci_registry = oci_registry.into();
        self
    }

    /// Overrides the write-capability root directory.
    pub fn with_write_root(mut self, write_root: impl Into<PathBuf>) -> Self {
        self.write_root = write_root.into();
        self
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_falls_back_to_defaults_without_env_vars() {
        std::env::remove_var(HOST_HOME_ENV_VAR);
        std::env::remove_var(OCI_REGISTRY_ENV_VAR);
        let config = HostConfig::load();
        assert_eq!(config.oci_registry, DEFAULT_OCI_REGISTRY);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = HostConfig::load()
            .with_home_dir("/tmp/example-host")
            .with_oci_registry("example.registry.test");
        assert_eq!(config.home_dir, PathBuf::from("/tmp/example-host"));
        assert_eq!(config.oci_registry, "example.registry.test");
    }
}
