use tracing::error;

use crate::retry::ExponentialRetry;

use super::table::Batch;

pub trait DBInfoProvider: Send {
    /// Round trip used right after connecting to make sure the connection works.
    fn ping(&mut self) -> anyhow::Result<()>;

    fn count_rows(&mut self, table: &str) -> anyhow::Result<u64>;
}

pub trait DBReader: Send + DBInfoProvider {
    /// Read at most `limit` rows starting at `offset`, preserving column order.
    /// An empty batch means there is nothing left to read.
    fn read_batch(&mut self, table: &str, offset: u64, limit: u64) -> anyhow::Result<Batch>;
}

pub trait DBWriter: Send + DBInfoProvider {
    /// Append rows to the table. Never truncates or updates existing rows.
    fn write_batch(&mut self, batch: &Batch, table: &str) -> anyhow::Result<()>;

    fn write_batch_with_retry(
        &mut self,
        batch: &Batch,
        table: &str,
        retries: usize,
    ) -> anyhow::Result<()> {
        let mut backoff = ExponentialRetry::new(retries);
        loop {
            match self.write_batch(batch, table) {
                Ok(()) => return Ok(()),
                Err(err) => match backoff.next() {
                    Some(delay) => {
                        error!("Got error: {err:?}. Retrying in {delay:?}");
                        std::thread::sleep(delay);
                    }
                    None => return Err(err),
                },
            }
        }
    }
}
