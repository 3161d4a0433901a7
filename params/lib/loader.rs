use serde_json::json;
use vfs::{Location, OperationKind, Recorder};

use crate::{ParamTree, ParamValue, ParamsError, ParamsResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Parses `bytes` as a [`ParamTree`], dispatching on `path`'s extension:
/// `.json` as JSON, `.yaml`/`.yml` as YAML, `.params` as newline-separated
/// `key=value` pairs (each key a dotted path), anything else is an error.
pub fn parse(path: &str, bytes: &[u8]) -> ParamsResult<ParamTree> {
    match extension_of(path) {
        "json" => Ok(serde_json::from_slice(bytes)?),
        "yaml" | "yml" => Ok(serde_yaml::from_slice(bytes)?),
        "params" => parse_key_value(bytes),
        other => Err(ParamsError::UnrecognizedFormat(other.to_string())),
    }
}

/// Reads and parses the parameter file at `location`, recording a
/// `parameter-file` operation on `recorder` if `location`'s filesystem is
/// not internal.
///
/// The caller is expected to have already confined `location` through a
/// sandbox; this function only reads and parses, so that parameter-file
/// recording isn't conflated with the sandbox's own `read-file` recording
/// of ordinary sandboxed reads.
pub async fn load(location: &Location, recorder: Option<&Recorder>) -> ParamsResult<ParamTree> {
    let file = location.open().await?;
    let bytes = file.contents().ok_or_else(|| {
        ParamsError::custom(anyhow::anyhow!(
            "parameter path {:?} is a directory",
            location.path
        ))
    })?;

    let tree = parse(&location.path, bytes)?;

    if !location.filesystem.is_internal() {
        if let Some(recorder) = recorder {
            recorder.record(OperationKind::ParameterFile, [("path", json!(location.qualify()))]);
        }
    }

    Ok(tree)
}

/// Parses a single `key=value` override, as supplied on a `-p` CLI flag:
/// `key` is a dotted path, `value` is interpreted as `null`/`true`/`false`/
/// a JSON number if it parses as one, otherwise a string.
pub fn parse_override(raw: &str) -> ParamsResult<(String, ParamValue)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| ParamsError::MalformedKeyValue(raw.to_string()))?;
    Ok((key.to_string(), scalar_of(value)))
}

fn parse_key_value(bytes: &[u8]) -> ParamsResult<ParamTree> {
    let text = std::str::from_utf8(bytes).map_err(ParamsError::custom)?;
    let mut tree = ParamTree::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = parse_override(line)?;
        tree.set(&key, value);
    }

    Ok(tree)
}

fn scalar_of(raw: &str) -> ParamValue {
    match raw {
        "null" => ParamValue::Null,
        "true" => ParamValue::Bool(true),
        "false" => ParamValue::Bool(false),
        _ => match raw.parse::<i64>() {
            Ok(n) => ParamValue::Number(serde_json::Number::from(n)),
            Err(_) => match raw.parse::<f64>() {
                Ok(n) => serde_json::Number::from_f64(n)
                    .map(ParamValue::Number)
                    .unwrap_or_else(|| ParamValue::String(raw.to_string())),
                Err(_) => ParamValue::String(raw.to_string()),
            },
        },
    }
}

fn extension_of(path: &str) -> &str {
    path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vfs::implementations::Native;

    use super::*;

    #[test]
    fn parses_json_by_extension() {
        let tree = parse("params.json", br#"{"a": {"b": 1}}"#).unwrap();
        assert_eq!(tree.get("a.b"), Some(&ParamValue::Number(1.into())));
    }

    #[test]
    fn parses_yaml_by_extension() {
        let tree = parse("params.yaml", b"a:\n  b: 1\n").unwrap();
        assert_eq!(tree.get("a.b"), Some(&ParamValue::Number(1.into())));
    }

    #[test]
    fn parses_key_value_params_file() {
        let tree = parse("overrides.params", b"a.b=1\n# comment\nc=hello\n").unwrap();
        assert_eq!(tree.get("a.b"), Some(&ParamValue::Number(1.into())));
        assert_eq!(tree.get("c"), Some(&ParamValue::String("hello".to_string())));
    }

    #[test]
    fn unrecognized_extension_errors() {
        let err = parse("params.toml", b"").unwrap_err();
        assert!(matches!(err, ParamsError::UnrecognizedFormat(_)));
    }

    #[test]
    fn override_parses_scalars() {
        assert_eq!(parse_override("a=true").unwrap().1, ParamValue::Bool(true));
        assert_eq!(parse_override("a=null").unwrap().1, ParamValue::Null);
        assert_eq!(parse_override("a=42").unwrap().1, ParamValue::Number(42.into()));
        assert_eq!(parse_override("a=hi").unwrap().1, ParamValue::String("hi".to_string()));
    }

    #[test]
    fn override_without_equals_is_malformed() {
        let err = parse_override("nokey").unwrap_err();
        assert!(matches!(err, ParamsError::MalformedKeyValue(_)));
    }

    #[tokio::test]
    async fn load_records_parameter_file_operation() {
        let dir = tempfile::TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("params.json"), br#"{"a": 1}"#).await.unwrap();

        let fs = Arc::new(Native::new(dir.path().to_path_buf()));
        let location = Location::new(fs, "/params.json");
        let recorder = Recorder::new();

        let tree = load(&location, Some(&recorder)).await.unwrap();
        assert_eq!(tree.get("a"), Some(&ParamValue::Number(1.into())));

        let log = recorder.log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind(), OperationKind::ParameterFile);
    }
}
