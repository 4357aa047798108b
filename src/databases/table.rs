use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Timestamptz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(serde_json::Value),
    Uuid(Uuid),
    Null,
}

pub type Row = Vec<Value>;

/// Rows read from one page of a table, with the column names in the order
/// the source returned them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Batch {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        return Self { columns, rows };
    }

    pub fn len(&self) -> usize {
        return self.rows.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.rows.is_empty();
    }

    pub fn quoted_columns(&self) -> String {
        return self
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
    }
}

/// Double-quote a column name, escaping embedded quotes.
/// Accepted by both postgres and sqlite.
pub fn quote_identifier(name: &str) -> String {
    return format!("\"{}\"", name.replace('"', "\"\""));
}
