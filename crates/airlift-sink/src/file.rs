//! Append-only JSON-lines file sink.
//!
//! One file per stream plus `states.jsonl` and `logs.jsonl` in a single
//! folder. State recovery reads the last line of `states.jsonl` backwards
//! from the end of the file, so startup cost does not grow with history.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use airlift_types::protocol::LogLevel;
use serde_json::{json, Value};

use crate::error::{self, SinkError};
use crate::sink::{Sink, WriteStamps};

const STATES_FILE: &str = "states.jsonl";
const LOGS_FILE: &str = "logs.jsonl";

/// File-backed sink writing newline-delimited JSON.
pub struct AppendFileSink {
    folder: PathBuf,
    states: File,
    logs: File,
    streams: HashMap<String, File>,
}

impl AppendFileSink {
    /// Open (creating as needed) the sink folder and its files.
    ///
    /// Stream files for `streams` are created up front so that an empty run
    /// still leaves one file per configured stream behind.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] when the folder or a file cannot be
    /// created or opened.
    pub fn open(folder: &Path, streams: &[String]) -> error::Result<Self> {
        std::fs::create_dir_all(folder)?;
        let states = open_append(&folder.join(STATES_FILE))?;
        let logs = open_append(&folder.join(LOGS_FILE))?;
        let mut stream_files = HashMap::new();
        for stream in streams {
            stream_files.insert(stream.clone(), open_append(&stream_path(folder, stream))?);
        }
        Ok(Self {
            folder: folder.to_path_buf(),
            states,
            logs,
            streams: stream_files,
        })
    }

    fn stream_file(&mut self, stream: &str) -> error::Result<&mut File> {
        if !self.streams.contains_key(stream) {
            let file = open_append(&stream_path(&self.folder, stream))?;
            self.streams.insert(stream.to_string(), file);
        }
        Ok(self
            .streams
            .get_mut(stream)
            .unwrap_or_else(|| unreachable!("inserted above")))
    }
}

impl Sink for AppendFileSink {
    fn write_records(
        &mut self,
        stream: &str,
        rows: &[Value],
        _stamps: &WriteStamps,
    ) -> error::Result<()> {
        let file = self.stream_file(stream)?;
        let mut out = String::new();
        for row in rows {
            out.push_str(&row.to_string());
            out.push('\n');
        }
        file.write_all(out.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn write_state(&mut self, state: &Value, stamps: &WriteStamps) -> error::Result<()> {
        let line = json!({
            "job_started_at": stamps.job_started_at,
            "slice_started_at": stamps.slice_started_at,
            "data": state,
        });
        writeln!(self.states, "{line}")?;
        self.states.flush()?;
        Ok(())
    }

    fn write_log(
        &mut self,
        level: LogLevel,
        message: &str,
        _stamps: &WriteStamps,
    ) -> error::Result<()> {
        let line = json!({ "level": level.as_str(), "message": message });
        writeln!(self.logs, "{line}")?;
        self.logs.flush()?;
        Ok(())
    }

    fn read_last_state(&mut self) -> error::Result<Option<Value>> {
        let Some(line) = read_last_line(&self.folder.join(STATES_FILE))? else {
            return Ok(None);
        };
        let entry: Value = serde_json::from_str(&line).map_err(SinkError::CorruptState)?;
        Ok(entry.get("data").cloned())
    }
}

fn stream_path(folder: &Path, stream: &str) -> PathBuf {
    folder.join(format!("{stream}.jsonl"))
}

fn open_append(path: &Path) -> error::Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Last non-empty line of a file, scanning backwards in chunks.
fn read_last_line(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let mut pos = file.metadata()?.len();
    let mut line_rev: Vec<u8> = Vec::new();
    let mut seen_content = false;
    let mut chunk = vec![0_u8; 8192];
    'outer: while pos > 0 {
        let take = chunk.len().min(usize::try_from(pos).unwrap_or(chunk.len()));
        pos -= take as u64;
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut chunk[..take])?;
        for &byte in chunk[..take].iter().rev() {
            if byte == b'\n' || byte == b'\r' {
                if seen_content {
                    break 'outer;
                }
            } else {
                seen_content = true;
                line_rev.push(byte);
            }
        }
    }
    if line_rev.is_empty() {
        return Ok(None);
    }
    line_rev.reverse();
    Ok(Some(String::from_utf8_lossy(&line_rev).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stamps() -> WriteStamps {
        WriteStamps {
            job_started_at: "2026-01-01T00:00:00Z".into(),
            slice_started_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn records_append_one_json_line_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = AppendFileSink::open(dir.path(), &["users".to_string()]).unwrap();
        sink.write_records("users", &[json!({"a": 1}), json!({"a": 2})], &stamps())
            .unwrap();
        sink.write_records("users", &[json!({"a": 3})], &stamps())
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("users.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#]);
    }

    #[test]
    fn unconfigured_stream_file_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = AppendFileSink::open(dir.path(), &[]).unwrap();
        sink.write_records("late", &[json!({"x": 1})], &stamps())
            .unwrap();
        assert!(dir.path().join("late.jsonl").exists());
    }

    #[test]
    fn state_roundtrip_returns_data_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = AppendFileSink::open(dir.path(), &[]).unwrap();
        assert_eq!(sink.read_last_state().unwrap(), None);

        sink.write_state(&json!({"cursor": 1}), &stamps()).unwrap();
        sink.write_state(&json!({"cursor": 2}), &stamps()).unwrap();
        assert_eq!(sink.read_last_state().unwrap(), Some(json!({"cursor": 2})));
    }

    #[test]
    fn logs_carry_level_and_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = AppendFileSink::open(dir.path(), &[]).unwrap();
        sink.write_log(LogLevel::Warn, "heads up", &stamps()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("logs.jsonl")).unwrap();
        let entry: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(entry["level"], "WARN");
        assert_eq!(entry["message"], "heads up");
    }

    #[test]
    fn read_last_line_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, "").unwrap();
        assert_eq!(read_last_line(&path).unwrap(), None);
    }

    #[test]
    fn read_last_line_single_line_no_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one");
        std::fs::write(&path, "only").unwrap();
        assert_eq!(read_last_line(&path).unwrap(), Some("only".into()));
    }

    #[test]
    fn read_last_line_trailing_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi");
        std::fs::write(&path, "first\nsecond\nlast\n\n").unwrap();
        assert_eq!(read_last_line(&path).unwrap(), Some("last".into()));
    }

    #[test]
    fn read_last_line_longer_than_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long");
        let long = "x".repeat(20_000);
        std::fs::write(&path, format!("first\n{long}\n")).unwrap();
        assert_eq!(read_last_line(&path).unwrap(), Some(long));
    }
}
