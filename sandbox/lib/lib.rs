//! Path sandboxing and magic-module capability tokens.
//!
//! [`Sandbox`] mediates every read or write a running script requests,
//! confining relative paths to a base (or write-root) location and
//! rejecting absolute paths and `..`-escapes by default. A
//! [`MagicModuleMint`] lifts that restriction for a specific module by
//! minting an opaque capability token bound to a [`ModuleAccess`] and
//! handing the script a JS shim that carries the token on every call back
//! into the host.

#![warn(missing_docs)]

mod error;
mod mint;
mod sandbox;
mod types;

pub use error::*;
pub use mint::*;
pub use sandbox::*;
pub use types::*;
