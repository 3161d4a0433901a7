//! The parameter store: a recursive, dotted-path-addressable tree of
//! values a script's parameters are assembled from.
//!
//! A [`ParamTree`] is what a JSON or YAML parameter file decodes into;
//! scripts and the host navigate it with dotted paths (`a.b.c`) rather
//! than nested field access, and several parameter sources — a file, a
//! `-p key=value` CLI override, a parent script's defaults — are combined
//! with [`merge`], later sources overriding scalars but deep-merging maps.

#![warn(missing_docs)]

mod error;
mod loader;
mod tree;

pub use error::*;
pub use loader::*;
pub use tree::*;
