//! Row hydration: column values to resources and back

#![allow(clippy::result_large_err)]

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::Row;
use warden_core::errors::ExError;
use warden_core::model::{FieldType, FieldValue, Resource};

use crate::errors::{corrupt_row, Result};

/// Column list in the order rows are selected and inserted:
/// public id, catalogue fields, timestamps, version
pub fn select_columns<R: Resource>() -> Vec<&'static str> {
    let mut cols = Vec::with_capacity(R::fields().len() + 4);
    cols.push("public_id");
    cols.extend(R::fields().iter().map(|f| f.column));
    cols.extend(["create_time", "update_time", "version"]);
    cols
}

/// Read every selected column as a raw value
pub fn read_values(row: &Row<'_>, count: usize) -> rusqlite::Result<Vec<Value>> {
    (0..count).map(|i| row.get::<_, Value>(i)).collect()
}

/// SQL value stored for a field; `keep_zero` is false on insert, where unset
/// optional fields are written as NULL.
pub fn to_sql_value(value: Option<&FieldValue>, keep_zero: bool) -> Value {
    match value {
        None => Value::Null,
        Some(v) if v.is_zero() && !keep_zero => Value::Null,
        Some(FieldValue::Text(s)) => Value::Text(s.clone()),
        Some(FieldValue::U32(n)) => Value::Integer(i64::from(*n)),
    }
}

fn field_value(ty: FieldType, column: &str, raw: &Value) -> Result<FieldValue> {
    match (ty, raw) {
        (_, Value::Null) => Ok(FieldValue::zero(ty)),
        (FieldType::Text, Value::Text(s)) => Ok(FieldValue::Text(s.clone())),
        (FieldType::U32, Value::Integer(n)) => u32::try_from(*n)
            .map(FieldValue::U32)
            .map_err(|e| corrupt_row(column, e)),
        (_, other) => Err(corrupt_row(column, format!("{:?}", other))),
    }
}

pub fn millis_to_time(column: &str, millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| corrupt_row(column, millis))
}

fn integer(column: &str, raw: &Value) -> Result<i64> {
    match raw {
        Value::Integer(n) => Ok(*n),
        other => Err(corrupt_row(column, format!("{:?}", other))),
    }
}

/// Build a resource from values read in [`select_columns`] order
pub fn hydrate<R: Resource>(values: &[Value]) -> Result<R> {
    let fields = R::fields();
    let expected = fields.len() + 4;
    if values.len() != expected {
        return Err(corrupt_row(
            "row",
            format!("expected {} columns, got {}", expected, values.len()),
        ));
    }

    let mut resource = R::empty();
    let public_id = match &values[0] {
        Value::Text(s) => s.clone(),
        other => return Err(corrupt_row("public_id", format!("{:?}", other))),
    };

    for (spec, raw) in fields.iter().zip(&values[1..]) {
        let value = field_value(spec.ty, spec.column, raw)?;
        resource
            .set_field(spec.column, value)
            .map_err(ExError::from)?;
    }

    let tail = &values[fields.len() + 1..];
    let create_time = millis_to_time("create_time", integer("create_time", &tail[0])?)?;
    let update_time = millis_to_time("update_time", integer("update_time", &tail[1])?)?;
    let version = u32::try_from(integer("version", &tail[2])?)
        .map_err(|e| corrupt_row("version", e))?;

    let meta = resource.meta_mut();
    meta.public_id = public_id;
    meta.create_time = Some(create_time);
    meta.update_time = Some(update_time);
    meta.version = version;
    Ok(resource)
}
