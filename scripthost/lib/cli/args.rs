use std::path::PathBuf;

use clap::Parser;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Command-line arguments for the `scripthost` binary.
#[derive(Debug, Parser)]
#[command(name = "scripthost", author, about, version)]
pub struct HostArgs {
    /// The subcommand to run.
    #[command(subcommand)]
    pub subcommand: HostSubcommand,

    /// A `key=value` parameter override. May be repeated.
    #[arg(short = 'p', long = "param", global = true)]
    pub params: Vec<String>,

    /// A parameter file to merge in before running, in the order given.
    #[arg(short = 'f', long = "param-file", global = true)]
    pub param_files: Vec<PathBuf>,
}

/// The subcommands of the `scripthost` CLI.
#[derive(Debug, Parser)]
pub enum HostSubcommand {
    /// Resolves and runs a script's module graph through the reference
    /// engine, printing its output to stdout.
    Run {
        /// Path to the entry script.
        script: PathBuf,

        /// Prints the recorded dependency report to stderr after running.
        #[arg(long)]
        report: bool,
    },

    /// Image cache management.
    Image {
        /// The image subcommand.
        #[command(subcommand)]
        subcommand: ImageSubcommand,
    },
}

/// Subcommands under `scripthost image`.
#[derive(Debug, Parser)]
pub enum ImageSubcommand {
    /// Pulls an image into the local cache.
    Pull {
        /// The image reference, e.g. `alpine:latest`.
        reference: String,
    },

    /// Lists images already present in the local cache.
    Ls {},
}
