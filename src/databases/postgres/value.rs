use std::io::Write;

use anyhow::Context;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{ToSql, Type};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::databases::table::Value;

impl TryFrom<(&Type, &postgres::Row, usize)> for Value {
    type Error = anyhow::Error;

    fn try_from(value: (&Type, &postgres::Row, usize)) -> Result<Self, Self::Error> {
        let (column_type, row, idx) = value;
        let parsed = match column_type {
            &Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
            &Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::I16),
            &Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::I32),
            &Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::I64),
            &Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(Value::F32),
            &Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::F64),
            &Type::NUMERIC => row
                .try_get::<_, Option<Decimal>>(idx)?
                .map(Value::Decimal),
            &Type::VARCHAR | &Type::TEXT | &Type::BPCHAR | &Type::NAME => row
                .try_get::<_, Option<String>>(idx)?
                .map(Value::String),
            &Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Bytes),
            &Type::TIMESTAMP => row
                .try_get::<_, Option<NaiveDateTime>>(idx)?
                .map(Value::Timestamp),
            &Type::TIMESTAMPTZ => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)?
                .map(Value::Timestamptz),
            &Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx)?.map(Value::Date),
            &Type::TIME => row.try_get::<_, Option<NaiveTime>>(idx)?.map(Value::Time),
            &Type::JSON | &Type::JSONB => row
                .try_get::<_, Option<serde_json::Value>>(idx)?
                .map(Value::Json),
            &Type::UUID => row.try_get::<_, Option<Uuid>>(idx)?.map(Value::Uuid),
            _ => {
                return Err(anyhow::anyhow!(
                    "Unsupported postgres type {column_type} in column {idx}"
                ));
            }
        };
        return Ok(parsed.unwrap_or(Value::Null));
    }
}

fn encode<T: ToSql>(column_type: &Type, value: &T, buffer: &mut BytesMut) -> anyhow::Result<()> {
    if !T::accepts(column_type) {
        return Err(anyhow::anyhow!("Unsupported type conversion to {column_type}"));
    }
    value
        .to_sql(column_type, buffer)
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("Failed to encode value as {column_type}"))?;
    return Ok(());
}

impl Value {
    fn as_i64(&self) -> Option<i64> {
        return match self {
            Value::I16(num) => Some(i64::from(*num)),
            Value::I32(num) => Some(i64::from(*num)),
            Value::I64(num) => Some(*num),
            _ => None,
        };
    }

    /// Encode one field of a binary COPY row: length prefix followed by the payload.
    pub(crate) fn write_postgres_bytes(
        &self,
        column_type: &Type,
        writer: &mut impl Write,
    ) -> anyhow::Result<()> {
        if self == &Value::Null {
            writer.write_all(&(-1_i32).to_be_bytes())?;
            return Ok(());
        }
        let mut buffer = BytesMut::new();
        match (column_type, self) {
            (&Type::INT8, _) if self.as_i64().is_some() => {
                encode(column_type, &self.as_i64(), &mut buffer)?
            }
            (&Type::INT4, _) if self.as_i64().is_some() => {
                let num = self.as_i64().map(i32::try_from).transpose()?;
                encode(column_type, &num, &mut buffer)?
            }
            (&Type::INT2, _) if self.as_i64().is_some() => {
                let num = self.as_i64().map(i16::try_from).transpose()?;
                encode(column_type, &num, &mut buffer)?
            }
            (&Type::NUMERIC, _) if self.as_i64().is_some() => {
                let num = self.as_i64().map(Decimal::from);
                encode(column_type, &num, &mut buffer)?
            }
            (&Type::FLOAT8, &Value::F32(num)) => encode(column_type, &f64::from(num), &mut buffer)?,
            (&Type::FLOAT4, &Value::F64(num)) => encode(column_type, &(num as f32), &mut buffer)?,
            (_, Value::F32(num)) => encode(column_type, num, &mut buffer)?,
            (_, Value::F64(num)) => encode(column_type, num, &mut buffer)?,
            (_, Value::Bool(val)) => encode(column_type, val, &mut buffer)?,
            (_, Value::Decimal(val)) => encode(column_type, val, &mut buffer)?,
            (_, Value::String(val)) => encode(column_type, val, &mut buffer)?,
            (_, Value::Bytes(val)) => encode(column_type, val, &mut buffer)?,
            (_, Value::Timestamp(val)) => encode(column_type, val, &mut buffer)?,
            (_, Value::Timestamptz(val)) => encode(column_type, val, &mut buffer)?,
            (_, Value::Date(val)) => encode(column_type, val, &mut buffer)?,
            (_, Value::Time(val)) => encode(column_type, val, &mut buffer)?,
            (_, Value::Json(val)) => encode(column_type, val, &mut buffer)?,
            (_, Value::Uuid(val)) => encode(column_type, val, &mut buffer)?,
            _ => return Err(anyhow::anyhow!("Unsupported type conversion to {column_type}")),
        };
        writer.write_all(&i32::try_from(buffer.len())?.to_be_bytes())?;
        writer.write_all(&buffer)?;
        return Ok(());
    }
}
