use mockall::mock;

use crate::databases::table::Batch;
use crate::databases::traits::{DBInfoProvider, DBReader, DBWriter};

mock! {
    pub Source {}

    impl DBInfoProvider for Source {
        fn ping(&mut self) -> anyhow::Result<()>;
        fn count_rows(&mut self, table: &str) -> anyhow::Result<u64>;
    }

    impl DBReader for Source {
        fn read_batch(&mut self, table: &str, offset: u64, limit: u64) -> anyhow::Result<Batch>;
    }
}

mock! {
    pub Destination {}

    impl DBInfoProvider for Destination {
        fn ping(&mut self) -> anyhow::Result<()>;
        fn count_rows(&mut self, table: &str) -> anyhow::Result<u64>;
    }

    impl DBWriter for Destination {
        fn write_batch(&mut self, batch: &Batch, table: &str) -> anyhow::Result<()>;
    }
}
