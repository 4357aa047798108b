use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::databases::table::{Batch, Row};
use crate::databases::traits::{DBInfoProvider, DBReader, DBWriter};

use super::id_batch;

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Row>>,
    broken_counts: HashSet<String>,
    /// (table, n) fails the n-th write call (0 based) into the table
    failing_writes: HashSet<(String, usize)>,
    write_calls: HashMap<String, usize>,
    read_calls: HashMap<String, usize>,
}

/// Shared handle to an in-memory database. Clones see the same tables.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    fn state(&self) -> MutexGuard<'_, State> {
        return self.state.lock().unwrap();
    }

    pub fn create_table(&self, table: &str) {
        self.state().tables.insert(table.to_string(), Vec::new());
    }

    pub fn fill_table(&self, table: &str, num_rows: u64) {
        let rows = id_batch(0, num_rows).rows;
        self.state()
            .tables
            .get_mut(table)
            .expect("table should exist")
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        return self.state().tables.get(table).cloned().unwrap_or_default();
    }

    pub fn break_count(&self, table: &str) {
        self.state().broken_counts.insert(table.to_string());
    }

    pub fn fail_write(&self, table: &str, call: usize) {
        self.state()
            .failing_writes
            .insert((table.to_string(), call));
    }

    pub fn read_calls(&self, table: &str) -> usize {
        return self.state().read_calls.get(table).copied().unwrap_or(0);
    }

    pub fn write_calls(&self, table: &str) -> usize {
        return self.state().write_calls.get(table).copied().unwrap_or(0);
    }
}

impl DBInfoProvider for MemoryDatabase {
    fn ping(&mut self) -> anyhow::Result<()> {
        return Ok(());
    }

    fn count_rows(&mut self, table: &str) -> anyhow::Result<u64> {
        let state = self.state();
        if state.broken_counts.contains(table) {
            return Err(anyhow::anyhow!("count query failed for {table}"));
        }
        return match state.tables.get(table) {
            Some(rows) => Ok(rows.len() as u64),
            None => Err(anyhow::anyhow!("relation \"{table}\" does not exist")),
        };
    }
}

impl DBReader for MemoryDatabase {
    fn read_batch(&mut self, table: &str, offset: u64, limit: u64) -> anyhow::Result<Batch> {
        let mut state = self.state();
        *state.read_calls.entry(table.to_string()).or_default() += 1;
        let rows = state
            .tables
            .get(table)
            .ok_or_else(|| anyhow::anyhow!("relation \"{table}\" does not exist"))?;
        let page = rows
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        return Ok(Batch::new(vec!["id".to_string()], page));
    }
}

impl DBWriter for MemoryDatabase {
    fn write_batch(&mut self, batch: &Batch, table: &str) -> anyhow::Result<()> {
        let mut state = self.state();
        let calls = state.write_calls.entry(table.to_string()).or_default();
        let call = *calls;
        *calls += 1;
        if state.failing_writes.contains(&(table.to_string(), call)) {
            return Err(anyhow::anyhow!("write {call} into {table} failed"));
        }
        state
            .tables
            .get_mut(table)
            .ok_or_else(|| anyhow::anyhow!("relation \"{table}\" does not exist"))?
            .extend(batch.rows.iter().cloned());
        return Ok(());
    }
}
