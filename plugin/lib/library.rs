use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::Notify;
use tracing::warn;

use crate::{fetch_info, Launcher, PluginError, PluginResult, ProcessLauncher, RendererClient};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Construction options for a [`Library`].
#[derive(Debug, Clone, Default)]
pub struct LibraryOptions {
    /// Directory downloaded plugin binaries are cached under. Unused by
    /// the local-path-only info resolution this core implements, but kept
    /// so an embedder's remote-fetching `Launcher` has somewhere to put
    /// them.
    pub plugin_directory: Option<std::path::PathBuf>,
}

#[derive(Debug, Clone)]
enum Phase {
    Starting,
    Running(Arc<dyn RendererClient>),
    Failure(String),
}

#[derive(Debug)]
struct Entry {
    phase: Mutex<Phase>,
    notify: Notify,
}

impl Entry {
    fn starting() -> Arc<Self> {
        Arc::new(Self {
            phase: Mutex::new(Phase::Starting),
            notify: Notify::new(),
        })
    }

    fn set_running(&self, client: Arc<dyn RendererClient>) {
        *self.phase.lock().expect("plugin phase mutex poisoned") = Phase::Running(client);
        self.notify.notify_waiters();
    }

    fn set_failure(&self, message: String) {
        *self.phase.lock().expect("plugin phase mutex poisoned") = Phase::Failure(message);
        self.notify.notify_waiters();
    }

    async fn wait_for_running(&self) -> PluginResult<Arc<dyn RendererClient>> {
        loop {
            match &*self.phase.lock().expect("plugin phase mutex poisoned") {
                Phase::Running(client) => return Ok(client.clone()),
                Phase::Failure(message) => return Err(PluginError::custom(anyhow::anyhow!(message.clone()))),
                Phase::Starting => {}
            }

            let notified = self.notify.notified();
            // Re-check after registering interest, in case the starter
            // finished and broadcast between our lock release above and
            // subscribing here.
            if let Phase::Running(client) = &*self.phase.lock().expect("plugin phase mutex poisoned") {
                return Ok(client.clone());
            }
            notified.await;
        }
    }
}

/// A cache of plugin processes keyed by plugin URI: the first caller to
/// request a given URI launches it, concurrent callers wait for that
/// launch to finish, and later callers get the cached client immediately.
#[derive(Debug)]
pub struct Library {
    #[allow(dead_code)]
    options: LibraryOptions,
    launcher: Arc<dyn Launcher>,
    plugins: Mutex<HashMap<String, Arc<Entry>>>,
}

impl Library {
    /// Builds a library that launches real plugin subprocesses.
    pub fn new(options: LibraryOptions) -> Self {
        Self::with_launcher(options, Arc::new(ProcessLauncher::new()))
    }

    /// Builds a library using a custom [`Launcher`] — the seam tests use
    /// to avoid spawning real processes.
    pub fn with_launcher(options: LibraryOptions, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            options,
            launcher,
            plugins: Mutex::new(HashMap::new()),
        }
    }

    /// Materializes the plugin of `kind` at `plugin_info` (a URI to its
    /// JSON info document), launching it on first request and returning
    /// the cached client on every subsequent one.
    pub async fn get(&self, kind: &str, plugin_info: &str) -> PluginResult<Arc<dyn RendererClient>> {
        let (entry, is_new) = {
            let mut plugins = self.plugins.lock().expect("plugin map mutex poisoned");
            if let Some(entry) = plugins.get(plugin_info) {
                (entry.clone(), false)
            } else {
                let entry = Entry::starting();
                plugins.insert(plugin_info.to_string(), entry.clone());
                (entry, true)
            }
        };

        if !is_new {
            return entry.wait_for_running().await;
        }

        match self.start(kind, plugin_info).await {
            Ok(client) => {
                entry.set_running(client.clone());
                Ok(client)
            }
            Err(err) => {
                entry.set_failure(err.to_string());
                Err(err)
            }
        }
    }

    /// Convenience wrapper over [`Library::get`] for the `"renderer"`
    /// kind.
    pub async fn get_renderer(&self, plugin_info: &str) -> PluginResult<Arc<dyn RendererClient>> {
        self.get("renderer", plugin_info).await
    }

    async fn start(&self, kind: &str, plugin_info: &str) -> PluginResult<Arc<dyn RendererClient>> {
        let info = fetch_info(plugin_info).await?;
        let binary = info.binary().ok_or(PluginError::NoBinaryForPlatform)?;
        self.launcher.launch(kind, binary).await
    }

    /// Tears down every running plugin process and clears the cache.
    pub fn close(&self) {
        let mut plugins = self.plugins.lock().expect("plugin map mutex poisoned");
        for entry in plugins.values() {
            if let Phase::Running(client) = &*entry.phase.lock().expect("plugin phase mutex poisoned") {
                client.shutdown();
            }
        }
        plugins.clear();
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        if !self.plugins.lock().expect("plugin map mutex poisoned").is_empty() {
            warn!("plugin library dropped with running plugins still cached; consider calling close()");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Debug)]
    struct FakeLauncher {
        launches: AtomicUsize,
        fail: bool,
    }

    #[derive(Debug)]
    struct FakeClient {
        calls: AtomicUsize,
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RendererClient for FakeClient {
        async fn render(&self, input: &[u8]) -> PluginResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input.to_vec())
        }

        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Launcher for FakeLauncher {
        async fn launch(&self, _kind: &str, _binary: &str) -> PluginResult<Arc<dyn RendererClient>> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PluginError::Spawn("fake failure".to_string()));
            }
            Ok(Arc::new(FakeClient {
                calls: AtomicUsize::new(0),
                shutdowns: Arc::new(AtomicUsize::new(0)),
            }))
        }
    }

    fn local_info(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("plugin.json");
        let key = format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH);
        std::fs::write(
            &path,
            format!(r#"{{"name":"echo","version":"0.1.0","binaries":{{"{key}":"/bin/echo"}}}}"#),
        )
        .unwrap();
        path.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn second_get_reuses_running_plugin() {
        let dir = tempfile::TempDir::new().unwrap();
        let uri = local_info(&dir);
        let launcher = Arc::new(FakeLauncher {
            launches: AtomicUsize::new(0),
            fail: false,
        });
        let library = Library::with_launcher(LibraryOptions::default(), launcher.clone());

        library.get_renderer(&uri).await.unwrap();
        library.get_renderer(&uri).await.unwrap();

        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_gets_share_one_launch() {
        let dir = tempfile::TempDir::new().unwrap();
        let uri = local_info(&dir);
        let launcher = Arc::new(FakeLauncher {
            launches: AtomicUsize::new(0),
            fail: false,
        });
        let library = Arc::new(Library::with_launcher(LibraryOptions::default(), launcher.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let library = library.clone();
            let uri = uri.clone();
            handles.push(tokio::spawn(async move { library.get_renderer(&uri).await.unwrap() }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_launch_is_cached_and_returned_to_every_waiter() {
        let dir = tempfile::TempDir::new().unwrap();
        let uri = local_info(&dir);
        let launcher = Arc::new(FakeLauncher {
            launches: AtomicUsize::new(0),
            fail: true,
        });
        let library = Library::with_launcher(LibraryOptions::default(), launcher.clone());

        let first = library.get_renderer(&uri).await.unwrap_err();
        let second = library.get_renderer(&uri).await.unwrap_err();

        assert!(matches!(first, PluginError::Custom(_)) || matches!(first, PluginError::Spawn(_)));
        assert!(matches!(second, PluginError::Custom(_)) || matches!(second, PluginError::Spawn(_)));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_platform_binary_errors_without_launching() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plugin.json");
        std::fs::write(&path, r#"{"name":"echo","version":"0.1.0","binaries":{}}"#).unwrap();
        let launcher = Arc::new(FakeLauncher {
            launches: AtomicUsize::new(0),
            fail: false,
        });
        let library = Library::with_launcher(LibraryOptions::default(), launcher.clone());

        let err = library.get_renderer(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, PluginError::NoBinaryForPlatform));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_shuts_down_running_plugins_and_clears_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let uri = local_info(&dir);
        let launcher = Arc::new(FakeLauncher {
            launches: AtomicUsize::new(0),
            fail: false,
        });
        let library = Library::with_launcher(LibraryOptions::default(), launcher.clone());

        let client = library.get_renderer(&uri).await.unwrap();
        library.close();

        library.get_renderer(&uri).await.unwrap();
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
        drop(client);
    }
}
