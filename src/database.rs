//! SQLite store for the simulated call center.
//!
//! Holds the raw prepared table written by ingestion, the `cenblocks` and
//! `voters` tables built from it, and the generated `calls`. Provides the
//! row source, event sink and chunk sink implementations the pipelines
//! run against.

use crate::constants::{columns, tables};
use crate::error::{Result, SimError};
use crate::generator::{EventSink, RowSource};
use crate::models::{BatchWindow, CallEvent, Frame, Value};
use crate::processor::sink::ChunkSink;
use crate::schema::{ALL_TABLES, CALLS};
use crate::sql::{build_create, build_insert, populate_cenblocks, populate_voters};

use rusqlite::types::{FromSql, FromSqlResult, Null, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Value::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        })
    }
}

/// Rows inserted by a build-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildOutStats {
    pub cenblocks: u64,
    pub voters: u64,
}

/// Handle on the simulator database
#[derive(Debug)]
pub struct SimDatabase {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SimDatabase {
    /// Open (or create) the database file, creating parent directories
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Opened database {} (journal mode {})", path.display(), journal_mode);
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Drop and create `cenblocks`, `voters` and `calls`
    pub fn recreate_tables(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for table in ALL_TABLES {
            tx.execute(&table.drop_statement(), [])?;
            tx.execute(&table.create_statement(), [])?;
        }
        tx.commit()?;
        info!("Recreated {} simulator tables", ALL_TABLES.len());
        Ok(())
    }

    /// Delete every row of `table`, returning the number removed
    pub fn clear_table(&self, table: &str) -> Result<u64> {
        let removed = self.conn.execute(&format!("DELETE FROM {}", table), [])?;
        debug!("Cleared {} rows from {}", removed, table);
        Ok(removed as u64)
    }

    pub fn count_rows(&self, table: &str) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    /// Populate `cenblocks` and `voters` from the prepared raw table
    pub fn build_out(&self, source_table: &str) -> Result<BuildOutStats> {
        if !self.table_exists(source_table)? {
            return Err(SimError::schema(
                source_table,
                "prepared table does not exist; ingest the raw file first",
            ));
        }

        let tx = self.conn.unchecked_transaction()?;
        let cenblocks = tx.execute(&populate_cenblocks(source_table), [])?;
        let voters = tx.execute(&populate_voters(source_table), [])?;
        tx.commit()?;

        let stats = BuildOutStats {
            cenblocks: cenblocks as u64,
            voters: voters as u64,
        };
        info!(
            "Built {} census blocks and {} voters from {}",
            stats.cenblocks, stats.voters, source_table
        );
        Ok(stats)
    }

    /// Windowed reads over `table`
    pub fn table(&self, table: &str) -> TableSource<'_> {
        TableSource {
            conn: &self.conn,
            table: table.to_string(),
        }
    }

    /// Event sink writing to `calls`
    pub fn calls(&self) -> CallsTable<'_> {
        CallsTable { conn: &self.conn }
    }

    /// Chunk sink appending to the raw prepared table `table`
    pub fn raw_table(&self, table: &str) -> RawTableSink<'_> {
        RawTableSink {
            conn: &self.conn,
            table: table.to_string(),
            created: false,
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A table read in id windows
#[derive(Debug)]
pub struct TableSource<'a> {
    conn: &'a Connection,
    table: String,
}

impl RowSource for TableSource<'_> {
    fn row_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    fn read_window(&self, window: &BatchWindow) -> Result<Frame> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} BETWEEN ?1 AND ?2 ORDER BY {}",
            self.table,
            columns::ID,
            columns::ID
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let header: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = header.len();

        let rows = stmt
            .query_map(params![window.start_id as i64, window.end_id as i64], |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })?
            .collect::<rusqlite::Result<Vec<Vec<Value>>>>()?;

        debug!(
            "Read {} rows from {} (window {}, ids {}-{})",
            rows.len(),
            self.table,
            window.index,
            window.start_id,
            window.end_id
        );
        Frame::with_rows(header, rows)
    }

    fn describe(&self) -> String {
        format!("table {}", self.table)
    }
}

/// The `calls` table as an event sink
#[derive(Debug)]
pub struct CallsTable<'a> {
    conn: &'a Connection,
}

impl EventSink for CallsTable<'_> {
    fn write_events(&mut self, window: &BatchWindow, events: &[CallEvent]) -> Result<u64> {
        let sql = format!(
            "{}VALUES (?1, ?2)",
            build_insert(CALLS.name, &CALLS.insertable_columns())
        );

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for event in events {
                stmt.execute(params![event.voter_key, event.call_result])?;
            }
        }
        tx.commit()?;

        debug!(
            "Committed {} calls for window {}",
            events.len(),
            window.index
        );
        Ok(events.len() as u64)
    }
}

/// The raw prepared table as a chunk sink.
///
/// The table is created by the first write when it does not exist yet,
/// with column types taken from the first non-null value of each column.
/// Every row carries the index of the chunk that wrote it, and writing a
/// chunk first deletes rows left by an earlier write of the same chunk, so
/// a chunk replayed after a crash is stored once.
#[derive(Debug)]
pub struct RawTableSink<'a> {
    conn: &'a Connection,
    table: String,
    created: bool,
}

impl RawTableSink<'_> {
    fn ensure_table(&mut self, chunk: &Frame) -> Result<()> {
        if self.created {
            return Ok(());
        }

        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.table],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if !exists {
            let column_types: Vec<(String, &str)> = std::iter::once((
                quote_ident(columns::CHUNK_INDEX),
                "INTEGER NOT NULL",
            ))
            .chain(chunk.columns().iter().map(|name| {
                let sql_type = chunk
                    .column(name)
                    .ok()
                    .and_then(|values| values.into_iter().find(|v| !v.is_null()))
                    .map(Value::sql_type)
                    .unwrap_or("VARCHAR");
                (quote_ident(name), sql_type)
            }))
            .collect();
            self.conn
                .execute(&build_create(&quote_ident(&self.table), &column_types), [])?;
            self.conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                    quote_ident(&format!("{}{}_idx", self.table, columns::CHUNK_INDEX)),
                    quote_ident(&self.table),
                    quote_ident(columns::CHUNK_INDEX)
                ),
                [],
            )?;
            info!(
                "Created table {} with {} data columns",
                self.table,
                column_types.len() - 1
            );
        }
        self.created = true;
        Ok(())
    }
}

impl ChunkSink for RawTableSink<'_> {
    fn write_chunk(&mut self, index: u64, chunk: &Frame) -> Result<u64> {
        self.ensure_table(chunk)?;

        let quoted: Vec<String> = std::iter::once(quote_ident(columns::CHUNK_INDEX))
            .chain(chunk.columns().iter().map(|c| quote_ident(c)))
            .collect();
        let sql = format!(
            "{}VALUES ({})",
            build_insert(&quote_ident(&self.table), &quoted),
            placeholders(quoted.len())
        );
        let chunk_value = Value::Integer(index as i64);

        let tx = self.conn.unchecked_transaction()?;
        let replaced = tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote_ident(&self.table),
                quote_ident(columns::CHUNK_INDEX)
            ),
            params![index as i64],
        )?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in chunk.rows() {
                stmt.execute(params_from_iter(
                    std::iter::once(&chunk_value).chain(row.values()),
                ))?;
            }
        }
        tx.commit()?;

        if replaced > 0 {
            warn!(
                "Chunk {} was already in {}; replaced {} rows",
                index, self.table, replaced
            );
        }
        Ok(chunk.len() as u64)
    }

    fn describe(&self) -> String {
        format!("table {}", self.table)
    }
}

/// Default name of the prepared raw table
pub fn raw_table_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    let reserved = [tables::CENBLOCKS, tables::VOTERS, tables::CALLS].contains(&cleaned);
    if cleaned.is_empty() || reserved || cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("raw_{}", cleaned)
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{RecordGenerator, WindowedReader};
    use crate::config::SimConfig;
    use crate::schema::{CENBLOCKS, VOTERS};
    use tempfile::TempDir;

    fn frame(columns: &[&str], rows: Vec<Vec<Value>>) -> Frame {
        Frame::with_rows(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    /// Raw table carrying every column build-out reads
    fn raw_columns() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for name in VOTERS
            .insertable_columns()
            .into_iter()
            .chain(CENBLOCKS.insertable_columns())
        {
            if name != columns::TOTAL_DONORS
                && name != columns::DONATION_TOTAL
                && !names.contains(&name)
            {
                names.push(name);
            }
        }
        names
    }

    fn raw_row(names: &[&str], voter: &str, block: i64, total: f64) -> Vec<Value> {
        names
            .iter()
            .map(|name| match *name {
                "ohvfid" => Value::from(voter),
                "blockgeoid" => Value::Integer(block),
                "total" => Value::Real(total),
                "is_donor" => Value::Integer(i64::from(total > 0.0)),
                "totalpop" => Value::Integer(100),
                "first_name" => Value::from(format!("name_{}", voter)),
                _ => Value::Null,
            })
            .collect()
    }

    #[test]
    fn test_value_round_trips_through_sqlite() {
        let db = SimDatabase::open_in_memory().unwrap();
        let values = vec![
            Value::Null,
            Value::Integer(-4),
            Value::Real(2.5),
            Value::from("text"),
        ];
        for value in values {
            let back: Value = db
                .connection()
                .query_row("SELECT ?1", params![value], |row| row.get(0))
                .unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_recreate_and_count() {
        let db = SimDatabase::open_in_memory().unwrap();
        db.recreate_tables().unwrap();
        for table in ALL_TABLES {
            assert!(db.table_exists(table.name).unwrap());
            assert_eq!(db.count_rows(table.name).unwrap(), 0);
        }
    }

    #[test]
    fn test_raw_sink_creates_table_on_first_write() {
        let db = SimDatabase::open_in_memory().unwrap();
        let mut sink = db.raw_table("oh_dist4");
        assert!(!db.table_exists("oh_dist4").unwrap());

        let first = frame(
            &["ohvfid", "age", "score"],
            vec![vec!["A".into(), Value::Integer(30), Value::Null]],
        );
        let second = frame(
            &["ohvfid", "age", "score"],
            vec![
                vec!["B".into(), Value::Integer(41), Value::Real(0.5)],
                vec!["C".into(), Value::Null, Value::Real(1.5)],
            ],
        );
        assert_eq!(sink.write_chunk(1, &first).unwrap(), 1);
        assert_eq!(sink.write_chunk(2, &second).unwrap(), 2);

        assert!(db.table_exists("oh_dist4").unwrap());
        assert_eq!(db.count_rows("oh_dist4").unwrap(), 3);
    }

    #[test]
    fn test_raw_sink_rewrite_replaces_chunk_rows() {
        let db = SimDatabase::open_in_memory().unwrap();
        let mut sink = db.raw_table("oh_dist4");
        let chunk = |ids: &[&str]| {
            frame(
                &["ohvfid"],
                ids.iter().map(|id| vec![Value::from(*id)]).collect(),
            )
        };

        sink.write_chunk(1, &chunk(&["A", "B"])).unwrap();
        sink.write_chunk(2, &chunk(&["C", "D"])).unwrap();
        // chunk 2 written again after a crash before its checkpoint
        sink.write_chunk(2, &chunk(&["C", "D"])).unwrap();

        assert_eq!(db.count_rows("oh_dist4").unwrap(), 4);
        let in_second: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM oh_dist4 WHERE _chunk = 2",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(in_second, 2);

        // a fresh handle on the existing table keeps replacing
        db.raw_table("oh_dist4")
            .write_chunk(1, &chunk(&["A"]))
            .unwrap();
        assert_eq!(db.count_rows("oh_dist4").unwrap(), 3);
    }

    #[test]
    fn test_build_out_groups_blocks() {
        let db = SimDatabase::open_in_memory().unwrap();
        db.recreate_tables().unwrap();

        let names = raw_columns();
        let raw = frame(
            &names,
            vec![
                raw_row(&names, "V1", 10, 25.0),
                raw_row(&names, "V2", 10, 0.0),
                raw_row(&names, "V3", 20, 5.0),
            ],
        );
        db.raw_table("oh_dist4").write_chunk(1, &raw).unwrap();

        let stats = db.build_out("oh_dist4").unwrap();
        assert_eq!(stats, BuildOutStats { cenblocks: 2, voters: 3 });

        let (donors, donated): (i64, f64) = db
            .connection()
            .query_row(
                "SELECT total_donors, donation_total FROM cenblocks WHERE blockgeoid = 10",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(donors, 1);
        assert_eq!(donated, 25.0);
    }

    #[test]
    fn test_build_out_requires_source() {
        let db = SimDatabase::open_in_memory().unwrap();
        db.recreate_tables().unwrap();
        assert!(matches!(
            db.build_out("missing"),
            Err(SimError::Schema { .. })
        ));
    }

    #[test]
    fn test_calls_generated_from_voters() {
        let db = SimDatabase::open_in_memory().unwrap();
        db.recreate_tables().unwrap();
        for i in 1..=5 {
            db.connection()
                .execute(
                    "INSERT INTO voters (ohvfid, first_name) VALUES (?1, ?2)",
                    params![format!("OH{}", i), "x"],
                )
                .unwrap();
        }

        let mut generator = RecordGenerator::new(&SimConfig::default().with_seed(Some(11)));
        let stats = generator
            .generate_events(&db.table(tables::VOTERS), &mut db.calls(), 0.4, None, 2)
            .unwrap();

        assert_eq!(stats.records_written, 5);
        assert_eq!(db.count_rows(tables::CALLS).unwrap(), 5);
        let positives: i64 = db
            .connection()
            .query_row("SELECT SUM(call_result) FROM calls", [], |row| row.get(0))
            .unwrap();
        // round(0.8) + round(0.8) + round(0.4)
        assert_eq!(positives, 2);
    }

    #[test]
    fn test_windowed_reads_from_table() {
        let temp_dir = TempDir::new().unwrap();
        let db = SimDatabase::open(&temp_dir.path().join("sim_db").join("datasets.db")).unwrap();
        db.recreate_tables().unwrap();
        for i in 1..=3 {
            db.connection()
                .execute(
                    "INSERT INTO calls (ohvfid, call_result) VALUES (?1, ?2)",
                    params![format!("OH{}", i), i % 2],
                )
                .unwrap();
        }

        let calls = db.table(tables::CALLS);
        let mut reader = WindowedReader::new(&calls, None, 1).unwrap();
        let (window, first) = reader.next().unwrap().unwrap();
        assert_eq!(window.index, 1);
        assert_eq!(first.columns(), &["id", "ohvfid", "call_result"].map(String::from)[..]);
        assert_eq!(first.row(0).unwrap().get("ohvfid"), Some(&Value::from("OH1")));
        assert_eq!(reader.count(), 2);
    }

    #[test]
    fn test_raw_table_name() {
        assert_eq!(raw_table_name(Path::new("data/OH Dist4.csv")), "oh_dist4");
        assert_eq!(raw_table_name(Path::new("2020.csv")), "raw_2020");
        assert_eq!(raw_table_name(Path::new("voters.csv")), "raw_voters");
    }
}
