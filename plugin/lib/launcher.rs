use std::{fmt, process::Stdio, sync::Mutex as StdMutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::Mutex,
};
use tracing::{info, warn};

use crate::{PluginError, PluginResult};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A running plugin of kind `"renderer"`: takes an input document, returns
/// its rendered bytes.
#[async_trait]
pub trait RendererClient: Send + Sync + fmt::Debug {
    /// Renders `input`, returning the rendered bytes or the plugin's
    /// reported error.
    async fn render(&self, input: &[u8]) -> PluginResult<Vec<u8>>;

    /// Tears down the plugin process. Called once by
    /// [`crate::Library::close`]; a no-op for clients that don't own a
    /// subprocess (e.g. test doubles).
    fn shutdown(&self) {}
}

/// Starts a plugin process for a given kind and binary path, performing
/// whatever handshake that kind's protocol requires, and returns a client
/// for calling into it.
///
/// Modeled as a trait (rather than a single hardcoded launch function) so
/// tests can substitute a launcher that never spawns a real process —
/// [`crate::Library`]'s caching and phase-machine behavior is independent
/// of how a plugin is actually started.
#[async_trait]
pub trait Launcher: Send + Sync + fmt::Debug {
    /// Launches `binary` as a plugin of the given `kind`.
    async fn launch(&self, kind: &str, binary: &str) -> PluginResult<std::sync::Arc<dyn RendererClient>>;
}

//--------------------------------------------------------------------------------------------------
// Process launcher
//--------------------------------------------------------------------------------------------------

/// The default [`Launcher`]: spawns `binary` as a child process and
/// exchanges newline-delimited JSON messages over its stdin/stdout.
///
/// The handshake is a single line the child is expected to print to
/// stdout once it's ready to accept requests (`{"ready":true}`); after
/// that, every `render` call writes one `{"input":"<base64>"}` line and
/// reads one `{"data":"<base64>"}` or `{"error":"<message>"}` line back.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    /// Builds a launcher that spawns real plugin subprocesses.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, kind: &str, binary: &str) -> PluginResult<std::sync::Arc<dyn RendererClient>> {
        if kind != "renderer" {
            return Err(PluginError::UnknownKind(kind.to_string()));
        }

        info!(binary, "starting plugin process");

        let mut child = Command::new(binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| PluginError::Spawn(err.to_string()))?;

        let stdin = child.stdin.take().ok_or_else(|| PluginError::Spawn("no stdin pipe".to_string()))?;
        let stdout = child.stdout.take().ok_or_else(|| PluginError::Spawn("no stdout pipe".to_string()))?;
        let mut reader = BufReader::new(stdout);

        let mut handshake = String::new();
        reader
            .read_line(&mut handshake)
            .await
            .map_err(|err| PluginError::Spawn(format!("handshake failed: {err}")))?;
        let ready: Handshake = serde_json::from_str(handshake.trim())
            .map_err(|err| PluginError::Spawn(format!("malformed handshake: {err}")))?;
        if !ready.ready {
            return Err(PluginError::Spawn("plugin reported not ready".to_string()));
        }

        Ok(std::sync::Arc::new(RpcRendererClient {
            child: StdMutex::new(Some(child)),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(reader),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct Handshake {
    ready: bool,
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    input: &'a [u8],
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    data: Option<Vec<u8>>,
    error: Option<String>,
}

/// A [`RendererClient`] backed by a subprocess talked to over stdio.
#[derive(Debug)]
struct RpcRendererClient {
    child: StdMutex<Option<Child>>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
}

#[async_trait]
impl RendererClient for RpcRendererClient {
    async fn render(&self, input: &[u8]) -> PluginResult<Vec<u8>> {
        let request = serde_json::to_vec(&RenderRequest { input }).map_err(|err| PluginError::Rpc(err.to_string()))?;

        let mut stdin = self.stdin.lock().await;
        stdin.write_all(&request).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        drop(stdin);

        let mut line = String::new();
        let mut stdout = self.stdout.lock().await;
        let n = stdout.read_line(&mut line).await?;
        if n == 0 {
            return Err(PluginError::Rpc("plugin closed its connection".to_string()));
        }

        let response: RenderResponse =
            serde_json::from_str(line.trim()).map_err(|err| PluginError::Rpc(err.to_string()))?;

        match (response.data, response.error) {
            (Some(data), _) => Ok(data),
            (None, Some(message)) => Err(PluginError::Rpc(message)),
            (None, None) => Err(PluginError::Rpc("plugin returned neither data nor error".to_string())),
        }
    }

    fn shutdown(&self) {
        if let Some(mut child) = self.child.lock().expect("plugin child mutex poisoned").take() {
            if let Err(err) = child.start_kill() {
                warn!(%err, "failed to kill plugin process");
            }
        }
    }
}
