//! Cross-process call bridge.
//!
//! The worker is the embedded `bridge/worker.py`, written to a temp file and
//! run with the target runtime's interpreter:
//!
//! ```text
//! parent                                   worker
//!   |-- stdin: {"module", "path", "args", "kwargs", "max_bytes"} -->|
//!   |                                       import, resolve, call
//!   |<-- file argv[1]: {"ok", "data" | "kind", "error", "size"} ----|
//! ```
//!
//! The response lives in a temp file rather than on stdout so that anything
//! the extractor prints cannot corrupt it. Its size is capped at
//! `max_result_bytes` on both sides.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, ExtractError};
use crate::process::{run_captured, RunError};

const WORKER_PY: &str = include_str!("bridge/worker.py");

#[derive(Debug, Serialize)]
pub(crate) struct Job<'a> {
    pub module: &'a str,
    pub path: &'a [String],
    pub args: &'a [String],
    pub kwargs: &'a BTreeMap<String, String>,
    pub max_bytes: u64,
}

#[derive(Debug, Deserialize)]
struct WorkerResponse {
    ok: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// Spawn `interpreter` on the worker, send `job`, and decode the reply.
///
/// `configure` lets the caller adjust the command (environment variables,
/// working directory) before it is spawned.
pub(crate) fn call(
    entry_id: &str,
    interpreter: &Path,
    job: &Job<'_>,
    timeout: Option<Duration>,
    configure: impl FnOnce(&mut Command),
) -> Result<Value, ExtractError> {
    let bridge_err = |reason: String| ExtractError::Bridge {
        entry_id: entry_id.to_string(),
        reason,
    };

    let mut worker = tempfile::Builder::new()
        .prefix("extractors_worker_")
        .suffix(".py")
        .tempfile()
        .map_err(|e| io_err(std::env::temp_dir(), e))?;
    if let Err(e) = worker.write_all(WORKER_PY.as_bytes()).and_then(|_| worker.flush()) {
        return Err(io_err(worker.path(), e));
    }

    let transport = tempfile::Builder::new()
        .prefix("extractors_result_")
        .suffix(".json")
        .tempfile()
        .map_err(|e| io_err(std::env::temp_dir(), e))?;

    let payload = serde_json::to_vec(job).map_err(|e| bridge_err(e.to_string()))?;

    let mut cmd = Command::new(interpreter);
    cmd.arg(worker.path()).arg(transport.path());
    configure(&mut cmd);

    let symbol = job.path.join(".");
    tracing::debug!(interpreter = %interpreter.display(), %symbol, "spawning worker");
    let captured = run_captured(cmd, Some(payload), timeout).map_err(|e| match e {
        RunError::Spawn(source) => ExtractError::Spawn {
            entry_id: entry_id.to_string(),
            program: interpreter.display().to_string(),
            source,
        },
        RunError::Wait(e) => io_err(interpreter, e),
        RunError::Timeout(d) => ExtractError::Timeout {
            entry_id: entry_id.to_string(),
            timeout_secs: d.as_secs(),
        },
    })?;
    if !captured.stdout.trim().is_empty() {
        tracing::debug!(output = %captured.stdout.trim_end(), "extractor stdout");
    }

    let size = std::fs::metadata(transport.path())
        .map_err(|e| io_err(transport.path(), e))?
        .len();
    if size == 0 {
        return Err(ExtractError::ProcessFailed {
            entry_id: entry_id.to_string(),
            command: format!("{} <worker> {symbol}", interpreter.display()),
            code: captured.code(),
            stderr: captured.stderr_tail(),
        });
    }
    if size > job.max_bytes {
        return Err(ExtractError::ResultTooLarge {
            entry_id: entry_id.to_string(),
            size,
            limit: job.max_bytes,
        });
    }

    let bytes = std::fs::read(transport.path()).map_err(|e| io_err(transport.path(), e))?;
    let response: WorkerResponse =
        serde_json::from_slice(&bytes).map_err(|e| bridge_err(format!("malformed response: {e}")))?;
    into_value(entry_id, job, response)
}

fn into_value(entry_id: &str, job: &Job<'_>, response: WorkerResponse) -> Result<Value, ExtractError> {
    if response.ok {
        return Ok(response.data.unwrap_or(Value::Null));
    }
    let entry_id = entry_id.to_string();
    let module = job.module.to_string();
    let symbol = job.path.join(".");
    let reason = response.error.unwrap_or_else(|| "unknown worker error".to_string());
    Err(match response.kind.as_deref() {
        Some("import") => ExtractError::ModuleNotFound {
            entry_id,
            module,
            reason,
        },
        Some("mismatch") => ExtractError::SymbolMismatch {
            entry_id,
            module,
            symbol,
        },
        Some("resolve") => ExtractError::SymbolResolution {
            entry_id,
            module,
            symbol,
        },
        Some("call") => ExtractError::CallFailed {
            entry_id,
            symbol,
            reason,
        },
        Some("too_large") => ExtractError::ResultTooLarge {
            entry_id,
            size: response.size.unwrap_or(0),
            limit: job.max_bytes,
        },
        _ => ExtractError::Bridge { entry_id, reason },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job<'a>(path: &'a [String], kwargs: &'a BTreeMap<String, String>) -> Job<'a> {
        Job {
            module: "demo",
            path,
            args: &[],
            kwargs,
            max_bytes: 10,
        }
    }

    fn response(json: &str) -> WorkerResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn worker_kinds_map_to_errors() {
        let path = vec!["demo".to_string(), "run".to_string()];
        let kwargs = BTreeMap::new();
        let job = job(&path, &kwargs);

        let err = into_value("e", &job, response(r#"{"ok": false, "kind": "import", "error": "No module"}"#)).unwrap_err();
        assert!(matches!(err, ExtractError::ModuleNotFound { ref module, .. } if module == "demo"));

        let err = into_value("e", &job, response(r#"{"ok": false, "kind": "resolve"}"#)).unwrap_err();
        assert!(matches!(err, ExtractError::SymbolResolution { ref symbol, .. } if symbol == "demo.run"));

        let err = into_value("e", &job, response(r#"{"ok": false, "kind": "mismatch"}"#)).unwrap_err();
        assert!(matches!(err, ExtractError::SymbolMismatch { .. }));

        let err = into_value("e", &job, response(r#"{"ok": false, "kind": "call", "error": "boom"}"#)).unwrap_err();
        assert!(matches!(err, ExtractError::CallFailed { ref reason, .. } if reason == "boom"));

        let err = into_value("e", &job, response(r#"{"ok": false, "kind": "too_large", "size": 99}"#)).unwrap_err();
        assert!(matches!(err, ExtractError::ResultTooLarge { size: 99, limit: 10, .. }));

        let err = into_value("e", &job, response(r#"{"ok": false, "kind": "encode", "error": "x"}"#)).unwrap_err();
        assert!(matches!(err, ExtractError::Bridge { .. }));
    }

    #[test]
    fn ok_without_data_is_null() {
        let path = vec!["demo".to_string(), "run".to_string()];
        let kwargs = BTreeMap::new();
        let value = into_value("e", &job(&path, &kwargs), response(r#"{"ok": true}"#)).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn worker_source_is_embedded() {
        assert!(WORKER_PY.contains("def main()"));
    }
}
