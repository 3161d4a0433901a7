//! The request/response envelope a [`crate::engine::ScriptEngine`]
//! exchanges with the host. Opaque to everything below it: we only pin
//! down the tagged-union shape, never a wire framing — an embedder picks
//! its own length-prefixed JSON, MessagePack, or whatever its engine
//! favors.

use serde::{Deserialize, Serialize};

use params::ParamValue;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A request a running script sends to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RpcRequest {
    /// Writes `value` (already encoded per `format`) to `path`.
    Write {
        /// The path to write, interpreted by the sandbox.
        path: String,
        /// The encoded value.
        value: Vec<u8>,
        /// The encoding the value is in, e.g. `"yaml"`.
        format: String,
        /// The capability token scoping this write, if any.
        module: Option<String>,
    },

    /// Reads the file at `path`.
    Read {
        /// The path to read, interpreted by the sandbox.
        path: String,
        /// The requested decoding, e.g. `"json"`.
        format: Option<String>,
        /// The capability token scoping this read, if any.
        module: Option<String>,
    },

    /// Looks up a dotted path in the merged parameter tree.
    Param {
        /// The dotted path to look up.
        path: String,
    },

    /// Decodes `data` per `format` into a [`ParamValue`].
    Parse {
        /// The raw bytes to decode.
        data: Vec<u8>,
        /// The encoding `data` is in.
        format: String,
    },

    /// Encodes `value` per `format`.
    Unparse {
        /// The value to encode.
        value: ParamValue,
        /// The encoding to produce.
        format: String,
    },

    /// Renders `input` through the named plugin.
    Render {
        /// The plugin's info-document URI.
        plugin: String,
        /// The input bytes to render.
        input: Vec<u8>,
    },

    /// Makes a one-shot RPC call to a plugin of an arbitrary kind.
    Call {
        /// The plugin's info-document URI.
        plugin: String,
        /// The method to invoke.
        method: String,
        /// The method's encoded arguments.
        args: Vec<u8>,
    },

    /// Cancels a previously returned deferred serial.
    Cancel {
        /// The serial to cancel.
        serial: u64,
    },

    /// Forwards a script's log line to the host's structured logger.
    Log {
        /// The message to log.
        message: String,
    },

    /// Requests metadata about a path without reading its contents.
    FileInfo {
        /// The path to stat, interpreted by the sandbox.
        path: String,
    },

    /// Lists the entries of a directory.
    List {
        /// The path to list, interpreted by the sandbox.
        path: String,
    },
}

/// The host's reply to an [`RpcRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RpcResponse {
    /// The request completed synchronously with `data`.
    Data {
        /// The response payload.
        data: Vec<u8>,
    },

    /// The request failed synchronously.
    Error {
        /// A human-readable description of the failure.
        message: String,
    },

    /// The request was accepted and will complete asynchronously; the
    /// fulfilment message will carry this serial.
    Deferred {
        /// The serial identifying the eventual fulfilment message.
        serial: u64,
    },

    /// The decoded value from a [`RpcRequest::Parse`] call.
    ParseData {
        /// The decoded value.
        value: ParamValue,
    },
}

/// An asynchronous fulfilment message the scheduler delivers for a
/// previously returned [`RpcResponse::Deferred`] serial.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Fulfilment {
    /// The deferred completed successfully with `data`.
    Data {
        /// The serial this fulfilment is for.
        serial: u64,
        /// The completed data.
        data: Vec<u8>,
    },

    /// The deferred failed.
    Error {
        /// The serial this fulfilment is for.
        serial: u64,
        /// A human-readable description of the failure.
        message: String,
    },

    /// The deferred has no further values (reserved for a future
    /// streaming variant; never emitted by this core today).
    End {
        /// The serial this fulfilment is for.
        serial: u64,
    },
}
