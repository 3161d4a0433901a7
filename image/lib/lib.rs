//! Content-addressed OCI image cache, registry client, and reference
//! parsing.
//!
//! An image reference ([`Reference`]) is resolved by [`Cache::download`]
//! into a manifest and a set of expanded layer directories, and exposed
//! to the rest of the host as a [`vfs::Filesystem`] by
//! [`Cache::open_as_filesystem`], which builds a [`vfs::implementations::Overlay`]
//! over the manifest's layers.

#![warn(missing_docs)]

mod cache;
mod error;
mod extract;
mod reference;
mod registry;

pub use cache::*;
pub use error::*;
pub use reference::*;
pub use registry::*;
