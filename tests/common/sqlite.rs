use std::path::PathBuf;

use db_relocator::uri::URI;
use fake::{Fake, Faker};
use rusqlite::{Connection, OpenFlags, params};
use tempfile::TempDir;

use super::{gen_database_name, row::TestRow, testable_database::TestableDatabase};

pub struct TestSqliteDatabase {
    pub path: PathBuf,
    pub conn: Connection,
    tmp_dir: TempDir,
}

impl TestSqliteDatabase {
    pub fn new() -> Self {
        let tmp_dir = tempfile::tempdir().unwrap();
        let path = tmp_dir.path().join(gen_database_name());
        let conn = Connection::open_with_flags(
            path.clone(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .expect("Failed to create test sqlite database");

        return Self {
            conn,
            path,
            tmp_dir,
        };
    }
}

impl TestableDatabase for TestSqliteDatabase {
    fn get_uri(&self) -> URI {
        return URI::Sqlite(format!("sqlite://{}", self.path.to_str().unwrap()));
    }

    fn execute(&mut self, query: &str) {
        self.conn.execute_batch(query).unwrap();
    }

    fn create_test_table(&mut self, table_name: &str) {
        let query = format!(
            "CREATE TABLE {table_name} (id INTEGER PRIMARY KEY, real REAL, text TEXT, blob BLOB, timestamp DATETIME)"
        );
        self.conn.execute(&query, []).unwrap();
    }

    fn create_plain_table(&mut self, table_name: &str) {
        let query = format!(
            "CREATE TABLE {table_name} (id INTEGER, real REAL, text TEXT, blob BLOB, timestamp DATETIME)"
        );
        self.conn.execute(&query, []).unwrap();
    }

    fn fill_test_table(&mut self, table_name: &str, num_rows: usize) {
        let query = format!("INSERT INTO {table_name} VALUES (?1, ?2, ?3, ?4, ?5)");
        let tx = self.conn.transaction().unwrap();
        {
            let mut stmt = tx.prepare(&query).unwrap();
            for i in 0..num_rows {
                let mut row: TestRow = Faker.fake();
                row.id = i as i64;
                stmt.execute(params![row.id, row.real, row.text, row.blob, row.timestamp])
                    .unwrap();
            }
        }
        tx.commit().unwrap();
    }

    fn get_all_rows(&mut self, table_name: &str) -> Vec<TestRow> {
        let query = format!("SELECT * FROM {table_name} ORDER BY id");

        let mut stmt = self.conn.prepare(&query).unwrap();
        let mut rows = Vec::new();
        for row in stmt.query_map([], |row| Ok(TestRow::from(row))).unwrap() {
            rows.push(row.unwrap());
        }
        return rows;
    }

    fn count_rows(&mut self, table_name: &str) -> u64 {
        let query = format!("SELECT count(*) FROM {table_name}");
        let count: i64 = self.conn.query_row(&query, [], |row| row.get(0)).unwrap();
        return count as u64;
    }
}
