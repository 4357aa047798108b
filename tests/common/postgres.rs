use fake::{Fake, Faker};
use postgres::{Client, NoTls};
use testcontainers::{Container, runners::SyncRunner};

use super::{row::TestRow, testable_database::TestableDatabase};

pub struct TestPostgresDatabase {
    pub uri: String,
    pub client: Client,
    container: Container<testcontainers_modules::postgres::Postgres>,
}

impl TestPostgresDatabase {
    pub fn new() -> Self {
        let container = testcontainers_modules::postgres::Postgres::default()
            .start()
            .unwrap();

        let uri = format!(
            "postgres://postgres:postgres@{}:{}/postgres",
            container.get_host().unwrap(),
            container.get_host_port_ipv4(5432).unwrap(),
        );
        let client = Client::connect(&uri, NoTls).expect("Unable to connect to test postgres");

        return Self {
            uri,
            client,
            container,
        };
    }
}

fn generate_placeholders(blocks: usize) -> String {
    (0..blocks)
        .map(|i| {
            let start = i * 5 + 1;
            let params = (start..start + 5)
                .map(|n| format!("${}", n))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", params)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl TestableDatabase for TestPostgresDatabase {
    fn get_uri(&self) -> db_relocator::uri::URI {
        return db_relocator::uri::URI::Postgres(self.uri.clone());
    }

    fn execute(&mut self, query: &str) {
        self.client.batch_execute(query).unwrap();
    }

    fn create_test_table(&mut self, name: &str) {
        let query = format!(
            "CREATE TABLE {name} (id BIGINT PRIMARY KEY, real DOUBLE PRECISION, text TEXT, blob BYTEA, timestamp TIMESTAMP)"
        );
        self.client
            .execute(&query, &[])
            .expect("Failed to create table");
    }

    fn create_plain_table(&mut self, name: &str) {
        let query = format!(
            "CREATE TABLE {name} (id BIGINT, real DOUBLE PRECISION, text TEXT, blob BYTEA, timestamp TIMESTAMP)"
        );
        self.client
            .execute(&query, &[])
            .expect("Failed to create table");
    }

    fn fill_test_table(&mut self, name: &str, num_rows: usize) {
        let mut trx = self.client.transaction().unwrap();

        let mut rows = Vec::with_capacity(num_rows);
        for i in 0..num_rows {
            let mut row: TestRow = Faker.fake();
            row.id = i as i64;
            rows.push(row);
        }
        for chunk in rows.chunks(100) {
            let mut params: Vec<&(dyn postgres::types::ToSql + Sync)> = Vec::new();
            for row in chunk.iter() {
                params.push(&row.id);
                params.push(&row.real);
                params.push(&row.text);
                params.push(&row.blob);
                params.push(&row.timestamp);
            }

            let placeholders = generate_placeholders(chunk.len());
            let query = format!("INSERT INTO {name} VALUES {placeholders}");

            trx.execute(&query, params.as_slice()).unwrap();
        }
        trx.commit().unwrap();
    }

    fn get_all_rows(&mut self, table_name: &str) -> Vec<TestRow> {
        let query = format!("SELECT * FROM {table_name} ORDER BY id");

        return self
            .client
            .query(&query, &[])
            .unwrap()
            .into_iter()
            .map(|row| row.into())
            .collect();
    }

    fn count_rows(&mut self, table_name: &str) -> u64 {
        let query = format!("SELECT count(*) FROM {table_name}");
        let count: i64 = self.client.query_one(&query, &[]).unwrap().get(0);
        return count as u64;
    }
}
