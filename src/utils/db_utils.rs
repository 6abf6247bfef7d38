use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::{AppError, AppResult};

/// SQL bindable value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    Null,
}

/// Expected JSON shape of an updatable column.
#[derive(Clone, Copy)]
pub enum ColumnKind {
    Text,
    Int,
    Float,
    Bool,
    Date,
    Time,
    /// Canonicalizes the input or rejects it.
    Enum(fn(&str) -> Option<String>),
}

/// One entry of a table's update whitelist.
#[derive(Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl Column {
    pub const fn required(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub const fn optional(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// Parses a strum enum and returns its stored spelling.
pub fn canonical<T>(raw: &str) -> Option<String>
where
    T: FromStr + AsRef<str>,
{
    raw.trim().parse::<T>().ok().map(|v| v.as_ref().to_string())
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Builds `UPDATE <table> SET ... WHERE id = ? AND deleted = 0` from a JSON
/// object. Only whitelisted columns are accepted and each value must match
/// the column kind.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    columns: &[Column],
    id: u64,
) -> AppResult<SqlUpdate> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::bad_request("No fields provided for update"));
    }

    let mut assignments = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let column = columns
            .iter()
            .find(|c| c.name == key)
            .ok_or_else(|| AppError::bad_request(format!("Field '{key}' cannot be updated")))?;
        values.push(convert(column, value)?);
        assignments.push(format!("{} = ?", column.name));
    }

    values.push(SqlValue::I64(id as i64));

    Ok(SqlUpdate {
        sql: format!(
            "UPDATE {table} SET {} WHERE id = ? AND deleted = 0",
            assignments.join(", ")
        ),
        values,
    })
}

fn convert(column: &Column, value: &Value) -> AppResult<SqlValue> {
    let invalid = || AppError::bad_request(format!("Invalid value for '{}'", column.name));

    if value.is_null() {
        return if column.nullable {
            Ok(SqlValue::Null)
        } else {
            Err(AppError::bad_request(format!("'{}' cannot be null", column.name)))
        };
    }

    let converted = match column.kind {
        ColumnKind::Text => {
            let s = value.as_str().ok_or_else(invalid)?.trim();
            if s.is_empty() && !column.nullable {
                return Err(AppError::bad_request(format!("'{}' cannot be empty", column.name)));
            }
            SqlValue::String(s.to_string())
        }
        ColumnKind::Int => SqlValue::I64(value.as_i64().ok_or_else(invalid)?),
        ColumnKind::Float => SqlValue::F64(value.as_f64().ok_or_else(invalid)?),
        ColumnKind::Bool => SqlValue::Bool(value.as_bool().ok_or_else(invalid)?),
        ColumnKind::Date => {
            let s = value.as_str().ok_or_else(invalid)?;
            SqlValue::Date(NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid())?)
        }
        ColumnKind::Time => {
            let s = value.as_str().ok_or_else(invalid)?;
            let t = NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|_| invalid())?;
            SqlValue::Time(t)
        }
        ColumnKind::Enum(parse) => {
            SqlValue::String(value.as_str().and_then(parse).ok_or_else(invalid)?)
        }
    };
    Ok(converted)
}

/// Runs the update and returns the affected row count.
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Time(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::EmploymentStatus;
    use serde_json::json;

    const COLUMNS: &[Column] = &[
        Column::required("first_name", ColumnKind::Text),
        Column::optional("department", ColumnKind::Text),
        Column::required("basic_salary", ColumnKind::Float),
        Column::optional("joining_date", ColumnKind::Date),
        Column::required(
            "employment_status",
            ColumnKind::Enum(canonical::<EmploymentStatus>),
        ),
    ];

    #[test]
    fn builds_set_clause_for_whitelisted_fields() {
        let payload = json!({ "basic_salary": 30000, "department": null });
        let update = build_update_sql("employees", &payload, COLUMNS, 5).unwrap();
        assert_eq!(
            update.sql,
            "UPDATE employees SET basic_salary = ?, department = ? WHERE id = ? AND deleted = 0"
        );
        assert_eq!(
            update.values,
            vec![SqlValue::F64(30000.0), SqlValue::Null, SqlValue::I64(5)]
        );
    }

    #[test]
    fn rejects_unknown_columns() {
        let err = build_update_sql("employees", &json!({ "deleted": true }), COLUMNS, 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "Field 'deleted' cannot be updated");
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("employees", &json!({}), COLUMNS, 1).is_err());
        assert!(build_update_sql("employees", &json!([1, 2]), COLUMNS, 1).is_err());
    }

    #[test]
    fn enum_values_are_canonicalized() {
        let update =
            build_update_sql("employees", &json!({ "employment_status": "on_leave" }), COLUMNS, 1)
                .unwrap();
        assert_eq!(update.values[0], SqlValue::String("ON_LEAVE".into()));
        assert!(
            build_update_sql("employees", &json!({ "employment_status": "retired" }), COLUMNS, 1)
                .is_err()
        );
    }

    #[test]
    fn type_mismatches_and_required_nulls_are_rejected() {
        assert!(build_update_sql("employees", &json!({ "basic_salary": "lots" }), COLUMNS, 1).is_err());
        assert!(build_update_sql("employees", &json!({ "first_name": null }), COLUMNS, 1).is_err());
        assert!(build_update_sql("employees", &json!({ "first_name": "  " }), COLUMNS, 1).is_err());
        assert!(build_update_sql("employees", &json!({ "joining_date": "03/01/2025" }), COLUMNS, 1).is_err());
    }
}
