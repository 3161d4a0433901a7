//! The `scripthost` command-line front end: a thin driver over [`crate::Host`]
//! that exercises the core without a real script engine, by resolving and
//! naively "running" a module graph with [`crate::engine::ConcatenatingEngine`].

mod args;

pub use args::*;

use std::path::Path;

use crate::{config::HostConfig, engine::ConcatenatingEngine, Host, HostResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Builds a [`Host`] from the process environment and applies the CLI's
/// `-p`/`-f` overrides to it, in the order given on the command line.
pub async fn build_host(args: &HostArgs) -> HostResult<Host> {
    let host = Host::new(HostConfig::load())?;

    for path in &args.param_files {
        host.load_param_file(path).await?;
    }
    for raw in &args.params {
        host.set_param_override(raw)?;
    }

    Ok(host)
}

/// Dispatches a parsed [`HostSubcommand`] against `host`, printing its
/// result to stdout (and, for `run --report`, the dependency report to
/// stderr).
pub async fn dispatch(host: &Host, subcommand: HostSubcommand) -> HostResult<()> {
    match subcommand {
        HostSubcommand::Run { script, report } => run(host, &script, report).await,
        HostSubcommand::Image { subcommand } => image(host, subcommand).await,
    }
}

async fn run(host: &Host, script: &Path, report: bool) -> HostResult<()> {
    let root = script.parent().unwrap_or_else(|| Path::new("."));
    let entry_name = script.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let session = host.open_session(root.to_path_buf());

    let engine = ConcatenatingEngine::new();
    let output = session.run_entry(&format!("/{entry_name}"), &engine).await?;
    tokio::io::AsyncWriteExt::write_all(&mut tokio::io::stdout(), &output).await?;

    if report {
        let report = session.dependency_report();
        eprintln!("{}", serde_json::to_string_pretty(&report).expect("dependency report is always serializable"));
    }

    Ok(())
}

async fn image(host: &Host, subcommand: ImageSubcommand) -> HostResult<()> {
    match subcommand {
        ImageSubcommand::Pull { reference } => {
            host.pull_image(&reference).await?;
            println!("pulled {reference}");
            Ok(())
        }
        ImageSubcommand::Ls {} => {
            for reference in cached_image_tags(&HostConfig::load().cache_dir).await? {
                println!("{reference}");
            }
            Ok(())
        }
    }
}

/// Walks `<cache_dir>/jk/manifests/<registry>/<repository>/tag/<tag>`,
/// reconstructing the `registry/repository:tag` references the cache
/// already holds a resolved manifest for.
async fn cached_image_tags(cache_dir: &Path) -> HostResult<Vec<String>> {
    let manifests_dir = cache_dir.join("jk").join("manifests");
    let mut references = Vec::new();

    let mut registries = match tokio::fs::read_dir(&manifests_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(references),
        Err(err) => return Err(err.into()),
    };

    while let Some(registry_entry) = registries.next_entry().await? {
        let registry = registry_entry.file_name().to_string_lossy().into_owned();
        collect_repository_tags(&registry_entry.path(), &registry, String::new(), &mut references).await?;
    }

    Ok(references)
}

#[async_recursion::async_recursion]
async fn collect_repository_tags(
    dir: &Path,
    registry: &str,
    repository_prefix: String,
    references: &mut Vec<String>,
) -> HostResult<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "tag" {
            let mut tags = tokio::fs::read_dir(entry.path()).await?;
            while let Some(tag_entry) = tags.next_entry().await? {
                let tag = tag_entry.file_name().to_string_lossy().into_owned();
                references.push(format!("{registry}/{repository_prefix}:{tag}"));
            }
            continue;
        }

        let nested_prefix = if repository_prefix.is_empty() {
            name
        } else {
            format!("{repository_prefix}/{name}")
        };
        collect_repository_tags(&entry.path(), registry, nested_prefix, references).await?;
    }
    Ok(())
}
