use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use num_format::{Locale, ToFormattedString};
use tracing::info;

#[derive(Debug)]
pub struct FormattedDuration(pub Duration);

impl Display for FormattedDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut t = self.0.as_secs();
        let seconds = t % 60;
        t /= 60;
        let minutes = t % 60;
        t /= 60;
        let hours = t % 24;
        t /= 24;
        if t > 0 {
            let days = t;
            write!(f, "{days}d {hours:02}:{minutes:02}:{seconds:02}")
        } else {
            write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
        }
    }
}

/// Running count of rows migrated for one table, measured against the row
/// count taken before the copy started.
pub struct TableMigrationProgress {
    table: String,
    total: u64,
    migrated: u64,
    started: Instant,
}

impl TableMigrationProgress {
    pub fn new(table: &str, total: u64) -> Self {
        return Self {
            table: table.to_string(),
            total,
            migrated: 0,
            started: Instant::now(),
        };
    }

    pub fn inc(&mut self, value: u64) {
        self.migrated += value;
        info!("Table {} {}", self.table, self);
    }

    pub fn migrated(&self) -> u64 {
        return self.migrated;
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        return self.migrated as f64 * 100.0 / self.total as f64;
    }

    fn rows_per_sec(&self, elapsed: Duration) -> u64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0;
        }
        return (self.migrated as f64 / secs) as u64;
    }
}

impl Display for TableMigrationProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let elapsed = self.started.elapsed();
        let per_sec = self.rows_per_sec(elapsed);
        write!(
            f,
            "[{}] Progress: {}/{} ({:.2}%) Rows per sec: {}",
            FormattedDuration(elapsed),
            self.migrated.to_formatted_string(&Locale::en),
            self.total.to_formatted_string(&Locale::en),
            self.percent(),
            per_sec.to_formatted_string(&Locale::en),
        )?;
        if per_sec > 0 {
            let left = self.total.saturating_sub(self.migrated);
            let eta = FormattedDuration(Duration::from_secs(left / per_sec));
            write!(f, " ETA: {eta}")?;
        }
        return Ok(());
    }
}
