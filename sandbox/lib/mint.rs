use std::sync::Arc;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::{ModuleAccess, ModuleAccessTable};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Mints capability tokens for "magic modules": synthetic modules a script
/// imports that, rather than being read from any filesystem, are generated
/// on the fly and bound to a specific [`ModuleAccess`].
///
/// The token is the only thing the generated shim hands to the script;
/// every call the shim makes back into the host carries it opaquely, and
/// the host recovers the bound access from [`ModuleAccessTable`]. Binding
/// the token to a per-process salt means a script cannot forge another
/// module's token even if it can see its own.
#[derive(Debug)]
pub struct MagicModuleMint {
    salt: [u8; 32],
    access: Arc<ModuleAccessTable>,
}

impl MagicModuleMint {
    /// Builds a mint backed by `access`, generating a fresh random salt.
    pub fn new(access: Arc<ModuleAccessTable>) -> Self {
        let mut salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut salt);
        Self { salt, access }
    }

    /// Mints a token bound to `access` and generates the JS shim a script
    /// imports to use it. Returns the shim's source and a synthetic
    /// canonical path for diagnostics and the dependency report.
    pub fn mint(&self, access: ModuleAccess) -> (Vec<u8>, String) {
        let canonical = access.location.qualify();
        let token = self.token_for(&canonical);
        let allow_write = access.allow_write_to_host;

        self.access.insert(token.clone(), access);

        let shim = generate_shim(&token, allow_write);
        (shim, format!("resource:{canonical}"))
    }

    fn token_for(&self, canonical_path: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical_path.as_bytes());
        hasher.update(self.salt);
        hex::encode(hasher.finalize())
    }
}

fn generate_shim(token: &str, allow_write: bool) -> Vec<u8> {
    let mut source = format!(
        r#"import std from '@jkcfg/std';

const module = "{token}";

function read(path, options) {{
  return std.read(path, Object.assign({{}}, options, {{ module }}));
}}
"#
    );

    if allow_write {
        source.push_str(
            r#"
function write(path, value, options) {
  return std.write(path, value, Object.assign({}, options, { module }));
}
"#,
        );
        source.push_str("\nexport default { read, write };\n");
    } else {
        source.push_str("\nexport default { read };\n");
    }

    source.into_bytes()
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Arc};

    use vfs::{implementations::Native, Location};

    use super::*;

    #[test]
    fn mint_produces_distinct_tokens_per_path() {
        let table = Arc::new(ModuleAccessTable::new());
        let mint = MagicModuleMint::new(table.clone());

        let a = ModuleAccess::new(Location::new(Arc::new(Native::new(PathBuf::from("/tmp/a"))), "/"));
        let b = ModuleAccess::new(Location::new(Arc::new(Native::new(PathBuf::from("/tmp/b"))), "/"));

        let (_, path_a) = mint.mint(a);
        let (_, path_b) = mint.mint(b);
        assert_ne!(path_a, path_b);
    }

    #[test]
    fn shim_omits_write_without_permission() {
        let table = Arc::new(ModuleAccessTable::new());
        let mint = MagicModuleMint::new(table);
        let access = ModuleAccess::new(Location::new(Arc::new(Native::new(PathBuf::from("/tmp"))), "/"));

        let (shim, _) = mint.mint(access);
        let source = String::from_utf8(shim).unwrap();
        assert!(!source.contains("function write"));
    }

    #[test]
    fn shim_includes_write_with_permission() {
        let table = Arc::new(ModuleAccessTable::new());
        let mint = MagicModuleMint::new(table.clone());
        let access =
            ModuleAccess::new(Location::new(Arc::new(Native::new(PathBuf::from("/tmp"))), "/")).with_write_to_host();

        let (shim, _) = mint.mint(access);
        let source = String::from_utf8(shim).unwrap();
        assert!(source.contains("function write"));
    }

    #[test]
    fn minted_token_resolves_in_access_table() {
        let table = Arc::new(ModuleAccessTable::new());
        let mint = MagicModuleMint::new(table.clone());
        let access = ModuleAccess::new(Location::new(Arc::new(Native::new(PathBuf::from("/tmp"))), "/"));

        let (shim, _) = mint.mint(access);
        let source = String::from_utf8(shim).unwrap();
        let token = source
            .lines()
            .find(|l| l.starts_with("const module"))
            .and_then(|l| l.split('"').nth(1))
            .unwrap();

        assert!(table.get(token).is_some());
    }
}
