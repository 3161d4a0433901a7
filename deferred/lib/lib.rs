//! The deferred scheduler: the bridge between asynchronous host work and a
//! script engine that can only be driven synchronously.
//!
//! The embedded script engine is single-threaded and cooperative (see the
//! crate-spanning concurrency model). When a script asks for something the
//! host can't answer immediately — a file read, a plugin render, a long RPC
//! — the host [`Scheduler::register`]s a [`Serial`]-tagged background task
//! and hands the serial back to the script right away. When the task
//! finishes, the scheduler calls back into a [`Resolver`] with exactly one
//! of `error`/`data`, tagged with that same serial, so the script-side
//! promise machinery can settle the right promise.

#![warn(missing_docs)]

mod error;
mod scheduler;

pub use error::*;
pub use scheduler::*;
