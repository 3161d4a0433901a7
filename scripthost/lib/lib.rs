//! `scripthost` wires the core components — [`vfs`], [`image`], [`resolve`],
//! [`sandbox`], [`deferred`], [`params`], and [`plugin`] — into a single
//! [`Host`] an embedder drives from a real script engine.
//!
//! # Modules
//!
//! - [`cli`] — a `clap`-derived CLI exercising the core without a real JS
//!   VM, by resolving and naively "executing" a module graph.
//! - [`config`] — [`HostConfig`], layering defaults, environment
//!   variables, and builder overrides.
//! - [`engine`] — the [`ScriptEngine`] trait this core treats as an
//!   out-of-scope collaborator, plus a naive reference implementation
//!   used by the CLI.
//! - [`rpc`] — the tagged-union RPC envelope shape the embedded engine and
//!   the host exchange (opaque framing; integrators choose their own wire
//!   codec).
//!
//! # Usage Example
//!
//! ```no_run
//! # async fn run() -> scripthost::HostResult<()> {
//! let config = scripthost::HostConfig::load();
//! let host = scripthost::Host::new(config)?;
//! host.scheduler().wait().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod embedded;
mod error;
mod host;

pub mod cli;
pub mod config;
pub mod engine;
pub mod rpc;

pub use embedded::*;
pub use error::*;
pub use host::*;
