//! The batch file: the JSON handoff between `fetch` and the loaders.
//!
//! Writes are atomic. The whole batch is serialised into a temporary file in
//! the destination directory, synced, and renamed over the target, so the
//! file on disk is always either the previous complete batch or the new
//! complete batch.
//!
//! Reads happen in two phases. The file must parse as a JSON array or the
//! read fails as a whole; individual elements are decoded afterwards so a
//! bad element only costs that element.

use std::{
  fs,
  io::{BufWriter, Write as _},
  path::{Path, PathBuf},
};

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{Error, Result, record::CountryRecord};

// ─── Write ───────────────────────────────────────────────────────────────────

/// Atomically replace `path` with `records` as a pretty-printed JSON array.
pub fn write_batch(path: &Path, records: &[CountryRecord]) -> Result<()> {
  let dir = match path.parent() {
    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
    _ => PathBuf::from("."),
  };
  fs::create_dir_all(&dir).map_err(Error::io(&dir))?;

  let mut tmp = NamedTempFile::new_in(&dir).map_err(Error::io(&dir))?;
  {
    let mut writer = BufWriter::new(tmp.as_file_mut());
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n").map_err(Error::io(path))?;
    writer.flush().map_err(Error::io(path))?;
  }
  tmp.as_file().sync_all().map_err(Error::io(path))?;
  tmp.persist(path).map_err(|e| Error::Io { path: path.to_path_buf(), source: e.error })?;

  tracing::debug!(path = %path.display(), records = records.len(), "batch written");
  Ok(())
}

// ─── Read ────────────────────────────────────────────────────────────────────

/// Read and structurally parse the batch file at `path`. Elements are
/// returned undecoded.
pub fn read_batch(path: &Path) -> Result<Vec<Value>> {
  let text = fs::read_to_string(path).map_err(Error::io(path))?;
  parse_batch(path, &text)
}

/// Parse `text` as a JSON array, reporting failures against `path`.
pub fn parse_batch(path: &Path, text: &str) -> Result<Vec<Value>> {
  let value: Value = serde_json::from_str(text).map_err(|e| Error::MalformedBatch {
    path:   path.to_path_buf(),
    line:   e.line(),
    column: e.column(),
    offset: byte_offset(text, e.line(), e.column()),
    reason: e.to_string(),
  })?;

  match value {
    Value::Array(entries) => Ok(entries),
    other => Err(Error::MalformedBatch {
      path:   path.to_path_buf(),
      line:   1,
      column: 1,
      offset: text.len() - text.trim_start().len(),
      reason: format!("expected a JSON array, found {}", kind_of(&other)),
    }),
  }
}

/// Decode element `index` of a batch into a [`CountryRecord`].
pub fn decode_entry(index: usize, value: Value) -> Result<CountryRecord> {
  let code = entry_code(&value).map(str::to_owned);
  serde_json::from_value(value).map_err(|e| Error::RecordSchemaViolation {
    index,
    code,
    reason: e.to_string(),
  })
}

/// The raw `country_code` of an element, if it has a string one.
pub fn entry_code(value: &Value) -> Option<&str> {
  value.get("country_code").and_then(Value::as_str)
}

/// The raw `country_name` of an element, if it has a string one.
pub fn entry_name(value: &Value) -> Option<&str> {
  value.get("country_name").and_then(Value::as_str)
}

/// Convert serde_json's 1-based line/column into a byte offset into `text`.
fn byte_offset(text: &str, line: usize, column: usize) -> usize {
  let line_start: usize = text
    .split_inclusive('\n')
    .take(line.saturating_sub(1))
    .map(str::len)
    .sum();
  (line_start + column.saturating_sub(1)).min(text.len())
}

fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
