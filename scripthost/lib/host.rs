//! The top-level [`Host`]: wires the module resolver, virtual filesystem,
//! image cache, sandbox, deferred scheduler, parameter store, and plugin
//! library together into the single object a script-engine embedding
//! drives.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde_json::Value;
use tracing::info;
use vfs::{
    implementations::{Native, Prefixed},
    Filesystem, Location, Recorder,
};

use deferred::{DeferredError, Scheduler};
use params::{parse_override, ParamTree, ParamValue};
use plugin::{Library, LibraryOptions};
use resolve::{FileImporter, MagicImporter, NodeImporter, Relative, Resolver, StaticImporter, StdImporter};
use sandbox::{MagicModuleMint, ModuleAccess, ModuleAccessTable, Sandbox};

use crate::{
    config::HostConfig,
    engine::ScriptEngine,
    rpc::{Fulfilment, RpcRequest, RpcResponse},
    Embedded, HostError, HostResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const STD_PREFIX: &str = "@jkcfg/std";

/// The standard-library modules a script may import directly; everything
/// else under `@jkcfg/std` is reachable only from within the standard
/// library itself (e.g. `param.js` calling into `read.js`).
const STD_PUBLIC_MODULES: &[&str] = &["index.js", "read.js", "write.js", "param.js", "parse_unparse.js", "render.js", "log.js"];

/// The specifier a script imports to obtain a capability-scoped `resource`
/// handle, minted fresh per importing module by [`Host::mint`].
const STD_RESOURCE_SPECIFIER: &str = "@jkcfg/std/resource";

/// The specifier an entry script resolves under, wired per call to
/// [`Session::run_entry`] since the entry path isn't known when the
/// session's resolver chain is first built.
const ENTRY_SPECIFIER: &str = "__entry__";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Everything the core needs, constructed once per process and shared by
/// every script run: the image cache, the deferred scheduler, the plugin
/// library, the magic-module mint, and the merged parameter tree.
#[derive(Debug)]
pub struct Host {
    config: HostConfig,
    cache: image::Cache,
    access: Arc<ModuleAccessTable>,
    mint: Arc<MagicModuleMint>,
    scheduler: Arc<Scheduler>,
    plugins: Arc<Library>,
    params: Mutex<ParamTree>,
    fulfilments: Arc<Mutex<Vec<Fulfilment>>>,
}

impl Host {
    /// Builds a host from `config`, creating its on-disk cache and
    /// write-root directories if they don't already exist.
    pub fn new(config: HostConfig) -> HostResult<Self> {
        std::fs::create_dir_all(&config.cache_dir)?;
        std::fs::create_dir_all(&config.write_root)?;

        let registry = Arc::new(image::DistributionClient::new());
        let cache = image::Cache::new(config.cache_dir.clone(), registry);
        let access = Arc::new(ModuleAccessTable::new());
        let mint = Arc::new(MagicModuleMint::new(access.clone()));

        Ok(Self {
            config,
            cache,
            access,
            mint,
            scheduler: Arc::new(Scheduler::new()),
            plugins: Arc::new(Library::new(LibraryOptions::default())),
            params: Mutex::new(ParamTree::new()),
            fulfilments: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// The deferred scheduler shared by every session this host opens.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Applies a `key=value` parameter override, as supplied on a CLI `-p`
    /// flag, to the host's merged parameter tree.
    pub fn set_param_override(&self, raw: &str) -> HostResult<()> {
        let (key, value) = parse_override(raw)?;
        self.params.lock().expect("param tree mutex poisoned").set(&key, value);
        Ok(())
    }

    /// Loads a parameter file at a real host path (not subject to
    /// sandboxing — the CLI's own `-f` flag names a path on disk directly)
    /// and deep-merges it into the host's parameter tree.
    pub async fn load_param_file(&self, path: &Path) -> HostResult<()> {
        let parent = path.parent().unwrap_or(Path::new("."));
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let fs = Arc::new(Native::new(parent.to_path_buf()));
        let location = Location::new(fs, format!("/{name}"));

        let loaded = params::load(&location, None).await?;
        let mut params = self.params.lock().expect("param tree mutex poisoned");
        params::merge(&mut params, loaded);
        Ok(())
    }

    /// A snapshot of the host's merged parameter tree.
    pub fn params(&self) -> ParamTree {
        self.params.lock().expect("param tree mutex poisoned").clone()
    }

    /// Downloads `reference` (`[registry/]repository[:tag][@digest]`) into
    /// the image cache, if it isn't already present.
    pub async fn pull_image(&self, reference: &str) -> HostResult<()> {
        let reference: image::Reference = reference.parse()?;
        info!(%reference, "pulling image");
        self.cache.download(&reference).await?;
        Ok(())
    }

    /// Opens a previously pulled image as a filesystem, usable as a
    /// module search root.
    pub async fn image_filesystem(&self, reference: &str) -> HostResult<Arc<dyn Filesystem>> {
        let reference: image::Reference = reference.parse()?;
        Ok(self.cache.open_as_filesystem(&reference).await?)
    }

    /// Mints a magic-module capability token bound to `access`, returning
    /// the generated JS shim and its synthetic canonical path.
    pub fn mint(&self, access: ModuleAccess) -> (Vec<u8>, String) {
        self.mint.mint(access)
    }

    /// Opens a session rooted at a real project directory on the host
    /// filesystem: a fresh dependency recorder, a resolver over the
    /// standard library plus the project tree, and a sandbox confining
    /// reads to the project and writes to the host's configured write
    /// root.
    pub fn open_session(&self, root: impl Into<PathBuf>) -> Session {
        let root = root.into();
        let project_fs: Arc<dyn Filesystem> = Arc::new(Native::new(root.clone()));
        let recorder = Arc::new(Recorder::new());

        let std_fs: Arc<dyn Filesystem> = Arc::new(Prefixed::internal(STD_PREFIX, Arc::new(Embedded::new())));

        let mint = self.mint.clone();
        let resource_importer = MagicImporter::new(STD_RESOURCE_SPECIFIER, true, move |base: &Location| {
            let (shim, _canonical) = mint.mint(ModuleAccess::new(base.clone()));
            shim
        });

        let importers: Vec<Arc<dyn resolve::Importer>> = vec![
            Arc::new(Relative),
            Arc::new(resource_importer),
            Arc::new(StdImporter::new(std_fs, STD_PUBLIC_MODULES.iter().copied())),
            Arc::new(FileImporter::new(project_fs.clone())),
            Arc::new(NodeImporter::new(project_fs.clone())),
        ];

        let base = Location::new(project_fs.clone(), "/");
        let resolver = Resolver::new(base.clone(), importers).with_recorder(recorder.clone());

        let write_root_path = self.config.write_root.clone();
        let write_root_fs: Arc<dyn Filesystem> = Arc::new(Native::new(write_root_path.clone()));
        let write_root = Location::new(write_root_fs, "/");

        let sandbox = Sandbox::new(base.clone(), write_root.clone(), self.access.clone()).with_recorder(recorder.clone());
        let params_sandbox = Sandbox::new(base, write_root, self.access.clone());

        Session {
            fs: project_fs,
            sandbox,
            params_sandbox,
            resolver,
            recorder,
            write_root_path,
        }
    }

    /// Drains every fulfilment message produced by deferred work since the
    /// last call, in completion order.
    pub fn drain_fulfilments(&self) -> Vec<Fulfilment> {
        std::mem::take(&mut *self.fulfilments.lock().expect("fulfilment queue mutex poisoned"))
    }

    /// Tears down the plugin library's running subprocesses.
    pub fn close(&self) {
        self.plugins.close();
    }
}

/// The resources bound to a single script run: a resolver rooted at a
/// real project directory, a sandbox confining its reads and writes, and
/// the dependency recorder both feed.
#[derive(Debug)]
pub struct Session {
    fs: Arc<dyn Filesystem>,
    sandbox: Sandbox,
    params_sandbox: Sandbox,
    resolver: Resolver,
    recorder: Arc<Recorder>,
    write_root_path: PathBuf,
}

impl Session {
    /// This session's resolver, scoped to the project root.
    pub fn resolver(&self) -> Resolver {
        self.resolver.clone()
    }

    /// Reads and runs `entry_path` (relative to the project root) to
    /// completion through `engine`.
    pub async fn run_entry(&self, entry_path: &str, engine: &dyn ScriptEngine) -> HostResult<Vec<u8>> {
        let location = Location::new(self.fs.clone(), entry_path);
        let static_importer = Arc::new(StaticImporter::from_location(ENTRY_SPECIFIER, location));
        let resolver = self.resolver.with_importer(static_importer);

        let (bytes, location, next) = resolver
            .resolve(ENTRY_SPECIFIER)
            .await
            .map_err(|err| HostError::custom(anyhow::anyhow!(err)))?;

        engine.run(&location.qualify(), bytes, next).await
    }

    /// Loads a parameter file through this session's sandbox (so it's
    /// confined the same way any other script-initiated read is), merging
    /// it into `params`.
    pub async fn load_param_file(&self, path: &str, token: Option<&str>, params: &mut ParamTree) -> HostResult<()> {
        let location = self.params_sandbox.resolve_for_read(path, token)?;
        let loaded = params::load(&location, Some(&self.recorder)).await?;
        params::merge(params, loaded);
        Ok(())
    }

    /// The recorded dependency report for this session so far, as the
    /// JSON array shape the embedder emits to stdout.
    pub fn dependency_report(&self) -> Value {
        serde_json::to_value(self.recorder.log()).expect("operation log is always serializable")
    }

    /// Handles one RPC request synchronously, where the request kind
    /// allows it. Asynchronous kinds (`render`, `call`) are registered
    /// with the host's deferred scheduler instead, and their eventual
    /// result is delivered through [`Host::drain_fulfilments`].
    pub async fn handle_request(&self, host: &Host, request: RpcRequest) -> RpcResponse {
        match self.try_handle_request(host, request).await {
            Ok(response) => response,
            Err(err) => RpcResponse::Error { message: err.to_string() },
        }
    }

    async fn try_handle_request(&self, host: &Host, request: RpcRequest) -> HostResult<RpcResponse> {
        match request {
            RpcRequest::Read { path, format: _, module } => {
                let location = self.sandbox.resolve_for_read(&path, module.as_deref())?;
                let file = location.open().await?;
                let data = file
                    .contents()
                    .ok_or_else(|| HostError::custom(anyhow::anyhow!("path {path:?} is a directory")))?
                    .to_vec();
                Ok(RpcResponse::Data { data })
            }

            RpcRequest::Write { path, value, format: _, module } => {
                let location = self.sandbox.resolve_for_write(&path, module.as_deref())?;
                let host_path = join_host_path(&self.write_root_path, &location.path);
                if let Some(parent) = host_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&host_path, &value).await?;
                Ok(RpcResponse::Data { data: Vec::new() })
            }

            RpcRequest::Param { path } => {
                let params = host.params();
                let data = serde_json::to_vec(&params.get(&path)).map_err(|err| HostError::custom(err))?;
                Ok(RpcResponse::Data { data })
            }

            RpcRequest::Parse { data, format } => {
                let value = decode(&format, &data)?;
                Ok(RpcResponse::ParseData { value })
            }

            RpcRequest::Unparse { value, format } => {
                let data = encode(&value, &format)?;
                Ok(RpcResponse::Data { data })
            }

            RpcRequest::FileInfo { path } => {
                let location = self.sandbox.resolve_for_read(&path, None)?;
                let file = location.open().await?;
                let data = serde_json::to_vec(&(file.metadata().is_dir(), file.metadata().len))
                    .map_err(|err| HostError::custom(err))?;
                Ok(RpcResponse::Data { data })
            }

            RpcRequest::List { path } => {
                let location = self.sandbox.resolve_for_read(&path, None)?;
                let file = location.open().await?;
                let names: Vec<&str> = file
                    .entries()
                    .ok_or_else(|| HostError::custom(anyhow::anyhow!("path {path:?} is not a directory")))?
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect();
                let data = serde_json::to_vec(&names).map_err(|err| HostError::custom(err))?;
                Ok(RpcResponse::Data { data })
            }

            RpcRequest::Cancel { serial } => {
                host.scheduler.cancel(serial);
                Ok(RpcResponse::Data { data: Vec::new() })
            }

            RpcRequest::Log { message } => {
                info!(target: "script", "{message}");
                Ok(RpcResponse::Data { data: Vec::new() })
            }

            RpcRequest::Render { plugin, input } => {
                let plugins = host.plugins.clone();
                let sink = Arc::new(FulfilmentSink::new(host.fulfilments.clone()));
                let serial = host.scheduler.register(
                    move |_ctx| async move {
                        let client = plugins.get_renderer(&plugin).await.map_err(|err| DeferredError::custom(anyhow::anyhow!(err)))?;
                        client.render(&input).await.map_err(|err| DeferredError::custom(anyhow::anyhow!(err)))
                    },
                    sink,
                );
                Ok(RpcResponse::Deferred { serial })
            }

            RpcRequest::Call { plugin, method, args } => {
                let plugins = host.plugins.clone();
                let sink = Arc::new(FulfilmentSink::new(host.fulfilments.clone()));
                let serial = host.scheduler.register(
                    move |_ctx| async move {
                        let client = plugins.get(&method, &plugin).await.map_err(|err| DeferredError::custom(anyhow::anyhow!(err)))?;
                        client.render(&args).await.map_err(|err| DeferredError::custom(anyhow::anyhow!(err)))
                    },
                    sink,
                );
                Ok(RpcResponse::Deferred { serial })
            }
        }
    }
}

fn join_host_path(root: &Path, virtual_path: &str) -> PathBuf {
    let trimmed = virtual_path.trim_start_matches('/');
    if trimmed.is_empty() {
        root.to_path_buf()
    } else {
        root.join(trimmed)
    }
}

fn decode(format: &str, bytes: &[u8]) -> HostResult<ParamValue> {
    match format {
        "json" => serde_json::from_slice(bytes).map_err(|err| HostError::custom(err)),
        "yaml" | "yml" => serde_yaml::from_slice(bytes).map_err(|err| HostError::custom(err)),
        other => Err(HostError::custom(anyhow::anyhow!("unrecognized parse format {other:?}"))),
    }
}

fn encode(value: &ParamValue, format: &str) -> HostResult<Vec<u8>> {
    match format {
        "json" => serde_json::to_vec(value).map_err(|err| HostError::custom(err)),
        "yaml" | "yml" => serde_yaml::to_string(value).map(String::into_bytes).map_err(|err| HostError::custom(err)),
        other => Err(HostError::custom(anyhow::anyhow!("unrecognized unparse format {other:?}"))),
    }
}

/// Bridges a deferred task's outcome into [`Host::drain_fulfilments`].
struct FulfilmentSink {
    fulfilments: Arc<Mutex<Vec<Fulfilment>>>,
}

impl FulfilmentSink {
    fn new(fulfilments: Arc<Mutex<Vec<Fulfilment>>>) -> Self {
        Self { fulfilments }
    }

    fn push(&self, fulfilment: Fulfilment) {
        self.fulfilments.lock().expect("fulfilment queue mutex poisoned").push(fulfilment);
    }
}

impl deferred::Resolver for FulfilmentSink {
    fn error(&self, serial: deferred::Serial, err: DeferredError) {
        self.push(Fulfilment::Error { serial, message: err.to_string() });
    }

    fn data(&self, serial: deferred::Serial, bytes: Vec<u8>) {
        self.push(Fulfilment::Data { serial, data: bytes });
    }
}
