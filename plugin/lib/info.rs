use std::collections::HashMap;

use serde::Deserialize;

use crate::{PluginError, PluginResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The JSON manifest a plugin URI points at: its name, version, and a map
/// from `<os>-<arch>` to the binary (a local path or a download URL) for
/// that platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Info {
    /// The plugin's declared name.
    pub name: String,

    /// The plugin's declared version.
    pub version: String,

    /// `<os>-<arch>` (e.g. `"linux-x86_64"`) to binary path/URL.
    pub binaries: HashMap<String, String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Info {
    /// Selects the published binary for the current OS and architecture,
    /// or `None` if this plugin doesn't publish one.
    pub fn binary(&self) -> Option<&str> {
        self.binaries.get(&current_platform()).map(String::as_str)
    }
}

fn current_platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Fetches a plugin's [`Info`] document from `uri`. Only bare local paths
/// are supported (no URI scheme) — the plugin library resolves remote
/// plugin distribution separately, this just reads the manifest.
pub async fn fetch_info(uri: &str) -> PluginResult<Info> {
    match uri.split_once("://") {
        Some((scheme, _)) => Err(PluginError::UnsupportedScheme(scheme.to_string())),
        None => fetch_local_info(uri).await,
    }
}

async fn fetch_local_info(path: &str) -> PluginResult<Info> {
    let bytes = tokio::fs::read(path).await?;
    let info: Info = serde_json::from_slice(&bytes)?;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_selects_current_platform() {
        let mut binaries = HashMap::new();
        let key = current_platform();
        binaries.insert(key.clone(), "/path/to/plugin".to_string());
        binaries.insert("never-matches".to_string(), "/nope".to_string());

        let info = Info {
            name: "echo".to_string(),
            version: "0.1.0".to_string(),
            binaries,
        };

        assert_eq!(info.binary(), Some("/path/to/plugin"));
    }

    #[test]
    fn binary_is_none_when_platform_unpublished() {
        let info = Info {
            name: "echo".to_string(),
            version: "0.1.0".to_string(),
            binaries: HashMap::new(),
        };

        assert_eq!(info.binary(), None);
    }

    #[tokio::test]
    async fn fetch_info_rejects_remote_scheme() {
        let err = fetch_info("https://example.com/plugin.json").await.unwrap_err();
        assert!(matches!(err, PluginError::UnsupportedScheme(scheme) if scheme == "https"));
    }

    #[tokio::test]
    async fn fetch_info_reads_local_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plugin.json");
        tokio::fs::write(
            &path,
            format!(
                r#"{{"name":"echo","version":"0.1.0","binaries":{{"{}":"/bin/echo"}}}}"#,
                current_platform()
            ),
        )
        .await
        .unwrap();

        let info = fetch_info(path.to_str().unwrap()).await.unwrap();
        assert_eq!(info.name, "echo");
        assert_eq!(info.binary(), Some("/bin/echo"));
    }
}
