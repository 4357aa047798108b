use anyhow::Context;
use tracing::{error, info, warn};

use crate::{
    databases::traits::{DBReader, DBWriter},
    progress::TableMigrationProgress,
};

/// Result of moving one batch. Failures are reported to the copy loop,
/// which logs them and carries on with the next offset.
#[derive(Debug)]
pub enum BatchOutcome {
    Copied(u64),
    /// The source returned no rows, nothing left to copy.
    Exhausted,
    Failed(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyReport {
    /// Source row count taken before the first batch
    pub total_rows: u64,
    pub rows_migrated: u64,
    pub failed_batches: usize,
}

pub struct TableMigrator {
    table: String,
    batch_size: u64,
    batch_write_retries: usize,
}

impl TableMigrator {
    pub fn new(table: &str, batch_size: u64) -> anyhow::Result<TableMigrator> {
        if batch_size == 0 {
            return Err(anyhow::anyhow!("Batch size should be greater than zero"));
        }
        return Ok(TableMigrator {
            table: table.to_string(),
            batch_size,
            batch_write_retries: 0,
        });
    }

    pub fn with_write_retries(mut self, retries: usize) -> Self {
        self.batch_write_retries = retries;
        return self;
    }

    fn copy_batch(
        &self,
        reader: &mut dyn DBReader,
        writer: &mut dyn DBWriter,
        offset: u64,
        limit: u64,
    ) -> BatchOutcome {
        let batch = match reader.read_batch(&self.table, offset, limit) {
            Ok(batch) => batch,
            Err(err) => return BatchOutcome::Failed(err.context("Failed to read batch")),
        };
        if batch.is_empty() {
            return BatchOutcome::Exhausted;
        }
        return match writer.write_batch_with_retry(&batch, &self.table, self.batch_write_retries)
        {
            Ok(()) => BatchOutcome::Copied(batch.len() as u64),
            Err(err) => BatchOutcome::Failed(err.context("Failed to write batch")),
        };
    }

    /// Copies the whole table in batches of `batch_size` rows.
    ///
    /// Failed batches are skipped and only reduce `rows_migrated`.
    /// An error is returned only when the copy could not run at all,
    /// e.g. the source row count query failed.
    pub fn run(
        &self,
        reader: &mut dyn DBReader,
        writer: &mut dyn DBWriter,
    ) -> anyhow::Result<CopyReport> {
        info!("Starting migration for table: {}", self.table);
        let total_rows = reader
            .count_rows(&self.table)
            .context("Failed to count rows in the source table")?;
        info!("Total rows to migrate: {total_rows}");

        let mut report = CopyReport {
            total_rows,
            rows_migrated: 0,
            failed_batches: 0,
        };
        if total_rows == 0 {
            warn!("Table {} is empty, skipping...", self.table);
            return Ok(report);
        }

        let mut progress = TableMigrationProgress::new(&self.table, total_rows);
        let mut offset = 0;
        while offset < total_rows {
            // Never read past the snapshot, rows added meanwhile are not copied
            let limit = self.batch_size.min(total_rows - offset);
            match self.copy_batch(reader, writer, offset, limit) {
                BatchOutcome::Copied(rows) => progress.inc(rows),
                BatchOutcome::Exhausted => {
                    warn!(
                        "No rows returned for table {} at offset {offset}, stopping",
                        self.table
                    );
                    break;
                }
                BatchOutcome::Failed(err) => {
                    error!("Error migrating batch starting at offset {offset}: {err:#}");
                    report.failed_batches += 1;
                }
            }
            offset += self.batch_size;
        }

        report.rows_migrated = progress.migrated();
        if report.failed_batches == 0 {
            info!(
                "Successfully migrated {} rows for table {}",
                report.rows_migrated, self.table
            );
        } else {
            warn!(
                "Migrated {} of {} rows for table {}, {} batches failed",
                report.rows_migrated, total_rows, self.table, report.failed_batches
            );
        }
        return Ok(report);
    }
}

/// Copies `table` with default settings and no write retries.
///
/// Returns the migrated row count and whether the copy could run at all.
/// Skipped batches only lower the row count, they don't make it fail.
pub fn copy_table(
    table: &str,
    reader: &mut dyn DBReader,
    writer: &mut dyn DBWriter,
    batch_size: u64,
) -> (u64, bool) {
    let report =
        TableMigrator::new(table, batch_size).and_then(|migrator| migrator.run(reader, writer));
    return match report {
        Ok(report) => (report.rows_migrated, true),
        Err(err) => {
            error!("Failed to migrate table {table}: {err:#}");
            (0, false)
        }
    };
}
