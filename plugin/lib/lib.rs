//! External renderer plugins: small standalone binaries that take a byte
//! payload and produce a rendered document, launched and driven over an
//! RPC connection rather than linked in.
//!
//! A [`Library`] is a cache, keyed by plugin URI, of the phase a plugin is
//! in — not yet requested, starting, running, or permanently failed — so
//! that concurrent requests for the same plugin share one subprocess
//! instead of racing to launch several.

#![warn(missing_docs)]

mod error;
mod info;
mod launcher;
mod library;

pub use error::*;
pub use info::*;
pub use launcher::*;
pub use library::*;
