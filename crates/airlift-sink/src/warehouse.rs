//! `SQLite`-backed warehouse-table sink.
//!
//! One table per stream (named from a `{stream}` template) plus dedicated
//! logs and states tables, auto-created on first use. Each flush is one
//! batched insert inside a transaction; state recovery is "most recent row
//! by insertion time". Insert failures are fatal for the run.

use std::collections::HashSet;
use std::path::Path;

use airlift_types::protocol::LogLevel;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{self, SinkError};
use crate::sink::{now_iso8601, Sink, WriteStamps};

/// Warehouse sink writing to `SQLite` tables.
pub struct SqliteWarehouseSink {
    conn: Connection,
    template: String,
    created_streams: HashSet<String>,
}

impl SqliteWarehouseSink {
    /// Open or create the warehouse database at `path`.
    ///
    /// `template` names stream tables and must contain a `{stream}`
    /// placeholder, e.g. `"raw_{stream}"`. The logs and states tables are
    /// derived from the same template and created immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Arguments`] for a malformed template,
    /// [`SinkError::Io`] if the parent directory can't be created, or
    /// [`SinkError::Sqlite`] on database failures.
    pub fn open(path: &Path, template: &str) -> error::Result<Self> {
        validate_template(template)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, template)
    }

    /// In-memory warehouse (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the database can't be initialized.
    pub fn in_memory(template: &str) -> error::Result<Self> {
        validate_template(template)?;
        Self::with_connection(Connection::open_in_memory()?, template)
    }

    fn with_connection(conn: Connection, template: &str) -> error::Result<Self> {
        let mut sink = Self {
            conn,
            template: template.to_string(),
            created_streams: HashSet::new(),
        };
        sink.conn.execute_batch(&format!(
            r#"
CREATE TABLE IF NOT EXISTS "{logs}" (
    job_started_at TEXT NOT NULL,
    slice_started_at TEXT NOT NULL,
    inserted_at TEXT NOT NULL,
    level TEXT NOT NULL,
    data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "{states}" (
    job_started_at TEXT NOT NULL,
    slice_started_at TEXT NOT NULL,
    inserted_at TEXT NOT NULL,
    state TEXT NOT NULL
);
"#,
            logs = sink.logs_table(),
            states = sink.states_table(),
        ))?;
        Ok(sink)
    }

    fn table_for(&self, stream: &str) -> String {
        // Stream names come from connector catalogs; normalize anything
        // outside [A-Za-z0-9_] so the template always yields a plain
        // identifier.
        let safe: String = stream
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        self.template.replace("{stream}", &safe)
    }

    fn logs_table(&self) -> String {
        self.template.replace("{stream}", "logs")
    }

    fn states_table(&self) -> String {
        self.template.replace("{stream}", "states")
    }

    fn ensure_stream_table(&mut self, stream: &str) -> error::Result<()> {
        if self.created_streams.contains(stream) {
            return Ok(());
        }
        let table = self.table_for(stream);
        tracing::debug!(stream, table, "Ensuring warehouse table exists");
        self.conn.execute_batch(&format!(
            r#"
CREATE TABLE IF NOT EXISTS "{table}" (
    job_started_at TEXT NOT NULL,
    slice_started_at TEXT NOT NULL,
    inserted_at TEXT NOT NULL,
    data TEXT NOT NULL
);
"#
        ))?;
        self.created_streams.insert(stream.to_string());
        Ok(())
    }
}

impl Sink for SqliteWarehouseSink {
    fn write_records(
        &mut self,
        stream: &str,
        rows: &[Value],
        stamps: &WriteStamps,
    ) -> error::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.ensure_stream_table(stream)?;
        let table = self.table_for(stream);
        let now = now_iso8601();
        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare(&format!(
                r#"INSERT INTO "{table}" (job_started_at, slice_started_at, inserted_at, data)
                   VALUES (?1, ?2, ?3, ?4)"#
            ))?;
            for row in rows {
                insert.execute(params![
                    stamps.job_started_at,
                    stamps.slice_started_at,
                    now,
                    row.to_string(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn write_state(&mut self, state: &Value, stamps: &WriteStamps) -> error::Result<()> {
        let states = self.states_table();
        self.conn.execute(
            &format!(
                r#"INSERT INTO "{states}" (job_started_at, slice_started_at, inserted_at, state)
                   VALUES (?1, ?2, ?3, ?4)"#
            ),
            params![
                stamps.job_started_at,
                stamps.slice_started_at,
                now_iso8601(),
                state.to_string(),
            ],
        )?;
        Ok(())
    }

    fn write_log(
        &mut self,
        level: LogLevel,
        message: &str,
        stamps: &WriteStamps,
    ) -> error::Result<()> {
        let logs = self.logs_table();
        self.conn.execute(
            &format!(
                r#"INSERT INTO "{logs}" (job_started_at, slice_started_at, inserted_at, level, data)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#
            ),
            params![
                stamps.job_started_at,
                stamps.slice_started_at,
                now_iso8601(),
                level.as_str(),
                message,
            ],
        )?;
        Ok(())
    }

    fn read_last_state(&mut self) -> error::Result<Option<Value>> {
        let states = self.states_table();
        let raw: Option<String> = self
            .conn
            .query_row(
                &format!(
                    r#"SELECT state FROM "{states}"
                       ORDER BY inserted_at DESC, rowid DESC LIMIT 1"#
                ),
                [],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(
                serde_json::from_str(&text).map_err(SinkError::CorruptState)?,
            )),
            None => Ok(None),
        }
    }
}

fn validate_template(template: &str) -> error::Result<()> {
    if !template.contains("{stream}") {
        return Err(SinkError::Arguments {
            name: "warehouse".into(),
            message: format!("table template `{template}` must contain `{{stream}}`"),
        });
    }
    let stripped = template.replace("{stream}", "");
    if stripped.is_empty() && template != "{stream}" {
        return Err(SinkError::Arguments {
            name: "warehouse".into(),
            message: "table template must not be empty".into(),
        });
    }
    if !stripped
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(SinkError::Arguments {
            name: "warehouse".into(),
            message: format!(
                "table template `{template}` may only contain letters, digits, and underscores"
            ),
        });
    }
    Ok(())
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

    fn row_count(sink: &SqliteWarehouseSink, table: &str) -> i64 {
        sink.conn
            .query_row(&format!(r#"SELECT count(*) FROM "{table}""#), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn batch_insert_and_auto_create() {
        let mut sink = SqliteWarehouseSink::in_memory("raw_{stream}").unwrap();
        sink.write_records("users", &[json!({"a": 1}), json!({"a": 2})], &stamps())
            .unwrap();
        assert_eq!(row_count(&sink, "raw_users"), 2);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut sink = SqliteWarehouseSink::in_memory("raw_{stream}").unwrap();
        sink.write_records("users", &[], &stamps()).unwrap();
        // No table was created for the stream.
        let exists: Option<String> = sink
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name='raw_users'",
                [],
                |row| row.get(0),
            )
            .optional()
            .unwrap();
        assert!(exists.is_none());
    }

    #[test]
    fn last_state_is_most_recent_row() {
        let mut sink = SqliteWarehouseSink::in_memory("raw_{stream}").unwrap();
        assert_eq!(sink.read_last_state().unwrap(), None);
        sink.write_state(&json!({"cursor": 1}), &stamps()).unwrap();
        sink.write_state(&json!({"cursor": 2}), &stamps()).unwrap();
        assert_eq!(sink.read_last_state().unwrap(), Some(json!({"cursor": 2})));
    }

    #[test]
    fn logs_are_stored_with_level() {
        let mut sink = SqliteWarehouseSink::in_memory("raw_{stream}").unwrap();
        sink.write_log(LogLevel::Error, "boom", &stamps()).unwrap();
        let (level, data): (String, String) = sink
            .conn
            .query_row("SELECT level, data FROM raw_logs", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(level, "ERROR");
        assert_eq!(data, "boom");
    }

    #[test]
    fn stream_names_are_sanitized() {
        let sink = SqliteWarehouseSink::in_memory("raw_{stream}").unwrap();
        assert_eq!(sink.table_for("public.users"), "raw_public_users");
    }

    #[test]
    fn template_requires_stream_placeholder() {
        let err = SqliteWarehouseSink::in_memory("raw_table")
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, SinkError::Arguments { .. }));
    }

    #[test]
    fn template_rejects_quote_characters() {
        let err = SqliteWarehouseSink::in_memory(r#"raw"{stream}"#)
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, SinkError::Arguments { .. }));
    }

    #[test]
    fn file_backed_warehouse_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("warehouse.sqlite");
        {
            let mut sink = SqliteWarehouseSink::open(&db, "raw_{stream}").unwrap();
            sink.write_state(&json!({"cursor": 7}), &stamps()).unwrap();
        }
        let mut sink = SqliteWarehouseSink::open(&db, "raw_{stream}").unwrap();
        assert_eq!(sink.read_last_state().unwrap(), Some(json!({"cursor": 7})));
    }
}
