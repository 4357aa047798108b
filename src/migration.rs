use itertools::Itertools;
use tracing::{debug, error, info};

use crate::databases::traits::{DBReader, DBWriter};
use crate::error::Error;
use crate::provider::ConnectionProvider;
use crate::table_migrator::TableMigrator;
use crate::verifier::verify;

pub const DEFAULT_BATCH_SIZE: u64 = 10_000;

/// Everything the migration needs, assembled once before it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationConfig {
    /// Tables in migration order. Repeated names are migrated once per occurrence.
    pub tables: Vec<String>,
    pub batch_size: u64,
    pub batch_write_retries: usize,
}

impl MigrationConfig {
    pub fn new(tables: &[String], batch_size: u64) -> Result<Self, Error> {
        let tables: Vec<String> = tables
            .iter()
            .map(|table| table.trim())
            .filter(|table| !table.is_empty())
            .map(String::from)
            .collect();
        if tables.is_empty() {
            return Err(Error::Config("no tables to migrate".to_string()));
        }
        if batch_size == 0 {
            return Err(Error::Config(
                "batch size should be greater than zero".to_string(),
            ));
        }
        return Ok(Self {
            tables,
            batch_size,
            batch_write_retries: 0,
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The copy could not run, e.g. the source count query failed
    Copy(String),
    /// Row counts differ or could not be compared
    Verification,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOutcome {
    Succeeded { rows_migrated: u64 },
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq)]
enum TableState {
    Pending,
    Copying,
    Verifying { rows_migrated: u64 },
    Done(TableOutcome),
}

impl TableState {
    fn advance(self, table: &str, next: TableState) -> TableState {
        debug!("Table {table}: {self:?} -> {next:?}");
        return next;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationSummary {
    /// One entry per configured table, in migration order
    pub outcomes: Vec<(String, TableOutcome)>,
}

impl MigrationSummary {
    fn tables_where(&self, succeeded: bool) -> Vec<&str> {
        return self
            .outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TableOutcome::Succeeded { .. }) == succeeded)
            .map(|(table, _)| table.as_str())
            .collect();
    }

    pub fn succeeded(&self) -> Vec<&str> {
        return self.tables_where(true);
    }

    pub fn failed(&self) -> Vec<&str> {
        return self.tables_where(false);
    }

    pub fn is_success(&self) -> bool {
        return self.failed().is_empty();
    }

    fn log(&self) {
        info!("Migration Summary:");
        info!("Successful tables: [{}]", self.succeeded().iter().join(", "));
        let failed = self.failed();
        if !failed.is_empty() {
            error!("Failed tables: [{}]", failed.iter().join(", "));
        }
    }
}

/// Calls `teardown` when the migration leaves scope, on every exit path.
struct TeardownGuard<'a, P: ConnectionProvider> {
    provider: &'a mut P,
}

impl<P: ConnectionProvider> Drop for TeardownGuard<'_, P> {
    fn drop(&mut self) {
        self.provider.teardown();
    }
}

pub struct Migration {
    config: MigrationConfig,
}

impl Migration {
    pub fn new(config: MigrationConfig) -> Self {
        return Self { config };
    }

    fn migrate_table(
        &self,
        table: &str,
        source: &mut dyn DBReader,
        destination: &mut dyn DBWriter,
    ) -> TableOutcome {
        info!("Processing table: {table}");
        let mut state = TableState::Pending.advance(table, TableState::Copying);
        let copy = match TableMigrator::new(table, self.config.batch_size) {
            Ok(migrator) => migrator
                .with_write_retries(self.config.batch_write_retries)
                .run(source, destination),
            Err(err) => Err(err),
        };
        state = match copy {
            Ok(report) => state.advance(
                table,
                TableState::Verifying {
                    rows_migrated: report.rows_migrated,
                },
            ),
            Err(err) => {
                error!("Failed to migrate table {table}: {err:#}");
                state.advance(
                    table,
                    TableState::Done(TableOutcome::Failed(FailureReason::Copy(format!(
                        "{err:#}"
                    )))),
                )
            }
        };
        if let TableState::Verifying { rows_migrated } = state {
            let outcome = if verify(table, source, destination) {
                TableOutcome::Succeeded { rows_migrated }
            } else {
                TableOutcome::Failed(FailureReason::Verification)
            };
            state = state.advance(table, TableState::Done(outcome));
        }
        return match state {
            TableState::Done(outcome) => outcome,
            other => TableOutcome::Failed(FailureReason::Copy(format!(
                "table migration stopped in state {other:?}"
            ))),
        };
    }

    /// Migrates every configured table, one after another.
    ///
    /// Fails only if the connections can't be opened, in which case no table
    /// is touched. Per table failures are reported in the summary.
    /// The provider is torn down before returning, whatever the result.
    pub fn run(&self, provider: &mut impl ConnectionProvider) -> Result<MigrationSummary, Error> {
        let guard = TeardownGuard { provider };
        info!("Starting database migration process...");
        let mut source = guard.provider.open_source().map_err(Error::Setup)?;
        let mut destination = guard.provider.open_destination().map_err(Error::Setup)?;

        let mut summary = MigrationSummary::default();
        for table in &self.config.tables {
            let outcome = self.migrate_table(table, source.as_mut(), destination.as_mut());
            summary.outcomes.push((table.clone(), outcome));
        }
        summary.log();
        return Ok(summary);
    }
}
