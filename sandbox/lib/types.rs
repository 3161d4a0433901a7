use std::{
    collections::HashMap,
    sync::RwLock,
};

use vfs::Location;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The access a single capability token grants a magic module.
#[derive(Debug, Clone)]
pub struct ModuleAccess {
    /// The location reads and writes are rooted at.
    pub location: Location,

    /// Whether paths may escape `location` (absolute paths pass through
    /// literally; relative paths still resolve under it).
    pub allow_paths_outside_sandbox: bool,

    /// Whether the module may write to the host filesystem at all.
    pub allow_write_to_host: bool,
}

impl ModuleAccess {
    /// Builds a read-only access record confined to `location`.
    pub fn new(location: Location) -> Self {
        Self {
            location,
            allow_paths_outside_sandbox: false,
            allow_write_to_host: false,
        }
    }

    /// Allows this access to read and write paths outside its location.
    pub fn with_paths_outside_sandbox(mut self) -> Self {
        self.allow_paths_outside_sandbox = true;
        self
    }

    /// Allows this access to write to the host filesystem.
    pub fn with_write_to_host(mut self) -> Self {
        self.allow_write_to_host = true;
        self
    }
}

/// A concurrency-safe map from capability token to the [`ModuleAccess`] it
/// was minted for.
///
/// Entries accumulate for the lifetime of a single script run and are
/// never removed: a token outlives the specific call that produced it,
/// since the script may hold on to it and call back into the host
/// repeatedly.
#[derive(Debug, Default)]
pub struct ModuleAccessTable {
    entries: RwLock<HashMap<String, ModuleAccess>>,
}

impl ModuleAccessTable {
    /// Builds an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `access` under `token`, replacing any previous entry.
    pub fn insert(&self, token: String, access: ModuleAccess) {
        self.entries
            .write()
            .expect("module access table poisoned")
            .insert(token, access);
    }

    /// Looks up the access granted to `token`, if any.
    pub fn get(&self, token: &str) -> Option<ModuleAccess> {
        self.entries
            .read()
            .expect("module access table poisoned")
            .get(token)
            .cloned()
    }
}
