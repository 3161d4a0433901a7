use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a plugin library operation.
pub type PluginResult<T> = Result<T, PluginError>;

/// An error raised while fetching plugin info, launching a plugin process,
/// or calling into a running plugin.
#[derive(pretty_error_debug::Debug, Error)]
pub enum PluginError {
    /// A plugin info URI used a scheme this library doesn't resolve (only
    /// bare local paths are supported).
    #[error("unknown plugin info URI scheme: {0:?}")]
    UnsupportedScheme(String),

    /// An I/O error reading a plugin info document or talking to a
    /// launched plugin process.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A plugin info document failed to decode as JSON.
    #[error("malformed plugin info: {0}")]
    Malformed(#[from] serde_json::Error),

    /// No binary was published for the current OS/architecture.
    #[error("no plugin binary published for this platform")]
    NoBinaryForPlatform,

    /// `Library::get` was asked for a plugin kind it doesn't know how to
    /// dispense.
    #[error("unknown plugin kind: {0:?}")]
    UnknownKind(String),

    /// The plugin process failed to launch or complete its handshake.
    #[error("plugin process failed to start: {0}")]
    Spawn(String),

    /// An RPC call to a running plugin failed.
    #[error("plugin RPC error: {0}")]
    Rpc(String),

    /// Any other error, wrapped for contexts that don't have a dedicated
    /// variant.
    #[error(transparent)]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PluginError {
    /// Creates a new `Err` result from any error type.
    pub fn custom(error: impl Into<anyhow::Error>) -> PluginError {
        PluginError::Custom(AnyError {
            error: error.into(),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
