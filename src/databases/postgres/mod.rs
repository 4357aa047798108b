use std::io::Write;

use anyhow::Context;
use postgres::types::Type;
use postgres::{Client, NoTls};
use tracing::debug;

use crate::databases::table::{Batch, Row, Value};
use crate::databases::traits::{DBInfoProvider, DBReader, DBWriter};

mod value;

pub struct PostgresDB {
    client: Client,
}

impl PostgresDB {
    pub fn new(uri: &str) -> anyhow::Result<Self> {
        let client = Client::connect(uri, NoTls)?;
        debug!("Connected to postgres");
        return Ok(Self { client });
    }

    fn get_column_types(&mut self, table: &str, columns: &str) -> anyhow::Result<Vec<Type>> {
        let query = format!("SELECT {columns} FROM {table} LIMIT 0");
        let stmt = self
            .client
            .prepare(&query)
            .context("Failed to get column types of destination table")?;
        return Ok(stmt.columns().iter().map(|c| c.type_().clone()).collect());
    }
}

impl DBInfoProvider for PostgresDB {
    fn ping(&mut self) -> anyhow::Result<()> {
        self.client.execute("SELECT 1", &[])?;
        return Ok(());
    }

    fn count_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        let count_query = format!("SELECT count(*) FROM {table}");
        return self
            .client
            .query_one(&count_query, &[])?
            .get::<_, i64>(0)
            .try_into()
            .context("Failed to convert i64 to u64");
    }
}

impl DBReader for PostgresDB {
    /// Pages with `LIMIT/OFFSET` and no `ORDER BY`. PostgreSQL doesn't promise a
    /// stable row order between queries (synchronized scans can start mid table),
    /// so pages may overlap or skip rows.
    fn read_batch(&mut self, table: &str, offset: u64, limit: u64) -> anyhow::Result<Batch> {
        let query = format!("SELECT * FROM {table} LIMIT {limit} OFFSET {offset}");
        let stmt = self
            .client
            .prepare(&query)
            .context("Failed to prepare select statement")?;
        let rows = self
            .client
            .query(&stmt, &[])
            .context("Failed to get data from postgres source")?;

        let columns = stmt.columns();
        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values: Row = Vec::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                values.push(
                    Value::try_from((column.type_(), row, idx))
                        .with_context(|| format!("Failed to read column {}", column.name()))?,
                );
            }
            result.push(values);
        }
        return Ok(Batch::new(
            columns.iter().map(|c| c.name().to_string()).collect(),
            result,
        ));
    }
}

// Binary COPY signature (first 11 bytes)
const BINARY_SIGNATURE: &[u8] = b"PGCOPY\n\xFF\r\n\0";

impl DBWriter for PostgresDB {
    fn write_batch(&mut self, batch: &Batch, table: &str) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let columns = batch.quoted_columns();
        let types = self.get_column_types(table, &columns)?;
        let num_fields = i16::try_from(types.len()).context("Too many columns")?;

        let query = format!("COPY {table} ({columns}) FROM STDIN WITH BINARY");
        let mut writer = self
            .client
            .copy_in(&query)
            .context("Failed to start writing data into postgres")?;

        writer.write_all(BINARY_SIGNATURE)?;

        // Flags (4 bytes).
        writer.write_all(&0_i32.to_be_bytes())?;

        // Header extension length (4 bytes)
        writer.write_all(&0_i32.to_be_bytes())?;

        for row in &batch.rows {
            if row.len() != types.len() {
                return Err(anyhow::anyhow!(
                    "Row has {} values, destination expects {}",
                    row.len(),
                    types.len()
                ));
            }
            writer.write_all(&num_fields.to_be_bytes())?;
            for (value, column_type) in std::iter::zip(row, &types) {
                value.write_postgres_bytes(column_type, &mut writer)?;
            }
        }
        writer.write_all(&(-1_i16).to_be_bytes())?;
        writer
            .finish()
            .context("Failed to finish writing to postgres")?;
        return Ok(());
    }
}
