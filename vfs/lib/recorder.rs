use std::{collections::BTreeMap, sync::Mutex};

use serde::Serialize;
use serde_json::Value;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The kind of operation an [`Operation`] records, per the dependency
/// report's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// An ES module import resolved to a non-internal filesystem.
    ImportFile,
    /// A `std.read`-style sandboxed read of a non-internal filesystem.
    ReadFile,
    /// A parameter file loaded and merged into a script's parameters.
    ParameterFile,
}

/// A single recorded operation: its kind, plus free-form named
/// parameters (e.g. `specifier`, `path`) describing what happened.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    kind: OperationKind,
    #[serde(flatten)]
    params: BTreeMap<String, Value>,
}

impl Operation {
    /// The kind of this operation.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// This operation's named parameters.
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }
}

/// Accumulates [`Operation`]s in insertion order for later serialization
/// as the dependency report.
///
/// Any component that touches a non-internal filesystem on the script's
/// behalf — the module resolver, the sandbox, the parameter loader — can
/// hold a `&Recorder` and append to it; none of them own the log.
#[derive(Debug, Default)]
pub struct Recorder {
    operations: Mutex<Vec<Operation>>,
}

impl Recorder {
    /// Builds an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation, built from `(key, value)` pairs that will be
    /// flattened alongside `kind` in the final JSON report.
    pub fn record(&self, kind: OperationKind, params: impl IntoIterator<Item = (&'static str, Value)>) {
        let params = params.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.operations
            .lock()
            .expect("recorder mutex poisoned")
            .push(Operation { kind, params });
    }

    /// Returns a snapshot of every operation recorded so far, in
    /// insertion order.
    pub fn log(&self) -> Vec<Operation> {
        self.operations.lock().expect("recorder mutex poisoned").clone()
    }
}
