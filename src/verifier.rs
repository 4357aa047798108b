use anyhow::Context;
use tracing::{error, info, warn};

use crate::databases::traits::{DBReader, DBWriter};

/// Compares fresh row counts of the table on both sides.
///
/// Only catches missing or extra rows. Query errors are logged and
/// reported as a failed verification.
pub fn verify(table: &str, source: &mut dyn DBReader, destination: &mut dyn DBWriter) -> bool {
    let counts = source
        .count_rows(table)
        .context("Failed to count rows in the source table")
        .and_then(|source_count| {
            let destination_count = destination
                .count_rows(table)
                .context("Failed to count rows in the destination table")?;
            return Ok((source_count, destination_count));
        });
    let (source_count, destination_count) = match counts {
        Ok(counts) => counts,
        Err(err) => {
            error!("Failed to verify migration for {table}: {err:#}");
            return false;
        }
    };
    info!("Verification for {table}: Source={source_count}, Destination={destination_count}");
    if source_count == destination_count {
        info!("✓ Migration verified successfully for {table}");
        return true;
    }
    warn!("✗ Row count mismatch for {table}");
    return false;
}
