use anyhow::Context;
use rusqlite::{Connection, OpenFlags, params, params_from_iter};

use crate::databases::table::{Batch, Row, Value};
use crate::databases::traits::{DBInfoProvider, DBReader, DBWriter};

mod value;

pub struct SqliteDB {
    connection: Connection,
}

impl SqliteDB {
    pub fn new(uri: &str) -> anyhow::Result<Self> {
        let path = uri.replace("sqlite://", "");
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        return Ok(SqliteDB { connection: conn });
    }
}

impl DBInfoProvider for SqliteDB {
    fn ping(&mut self) -> anyhow::Result<()> {
        self.connection
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        return Ok(());
    }

    fn count_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        let query = format!("SELECT count(*) FROM {table}");
        let count: i64 = self.connection.query_row(&query, [], |row| row.get(0))?;
        return count.try_into().context("Failed to convert i64 to u64");
    }
}

impl DBReader for SqliteDB {
    /// Pages with `LIMIT/OFFSET` and no `ORDER BY`. SQLite doesn't promise a stable
    /// row order between queries, so pages are only consistent while the table
    /// isn't modified.
    fn read_batch(&mut self, table: &str, offset: u64, limit: u64) -> anyhow::Result<Batch> {
        let query = format!("SELECT * FROM {table} LIMIT ?1 OFFSET ?2");
        let mut stmt = self
            .connection
            .prepare(&query)
            .context("Failed to create read query")?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = columns.len();
        let mut rows = stmt
            .query(params![i64::try_from(limit)?, i64::try_from(offset)?])
            .context("Failed to read rows")?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().context("Failed to read row")? {
            let mut values: Row = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(Value::try_from(
                    row.get_ref(idx).context("Failed to read value")?,
                )?);
            }
            result.push(values);
        }
        return Ok(Batch::new(columns, result));
    }
}

impl DBWriter for SqliteDB {
    fn write_batch(&mut self, batch: &Batch, table: &str) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let placeholders = (1..=batch.columns.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            batch.quoted_columns()
        );
        let tx = self
            .connection
            .transaction()
            .context("Failed to start transaction")?;
        {
            let mut stmt = tx
                .prepare_cached(&query)
                .context("Failed to create write query")?;
            for row in &batch.rows {
                stmt.execute(params_from_iter(row.iter()))
                    .context("Failed to write data")?;
            }
        }
        tx.commit().context("Failed to commit batch")?;
        return Ok(());
    }
}
