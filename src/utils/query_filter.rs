//! Dynamic WHERE clauses for list endpoints, bound positionally.

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::{FromRow, MySqlPool};

use crate::error::AppResult;
use crate::utils::pagination::{Page, PageQuery};

// Helper enum for typed SQLx binding
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl From<u64> for FilterValue {
    fn from(v: u64) -> Self {
        FilterValue::U64(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::I64(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        FilterValue::I64(v as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::F64(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Str(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Str(v)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(v: NaiveDate) -> Self {
        FilterValue::Date(v)
    }
}

impl From<NaiveDateTime> for FilterValue {
    fn from(v: NaiveDateTime) -> Self {
        FilterValue::DateTime(v)
    }
}

#[derive(Debug, Default)]
pub struct Filter {
    conditions: Vec<String>,
    args: Vec<FilterValue>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A condition without placeholders.
    pub fn raw(mut self, condition: &str) -> Self {
        self.conditions.push(condition.to_string());
        self
    }

    /// A condition with exactly one `?`.
    pub fn and(mut self, condition: &str, value: impl Into<FilterValue>) -> Self {
        self.conditions.push(condition.to_string());
        self.args.push(value.into());
        self
    }

    /// A condition with one `?` per value, in order.
    pub fn and_all(mut self, condition: &str, values: Vec<FilterValue>) -> Self {
        self.conditions.push(condition.to_string());
        self.args.extend(values);
        self
    }

    pub fn and_opt<V: Into<FilterValue>>(self, condition: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.and(condition, v),
            None => self,
        }
    }

    /// `(a LIKE ? OR b LIKE ? ...)` over `columns`, ignoring blank terms.
    pub fn search(mut self, columns: &[&str], term: Option<&str>) -> Self {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };
        let like = format!("%{term}%");
        let clause = columns
            .iter()
            .map(|c| format!("{c} LIKE ?"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.conditions.push(format!("({clause})"));
        self.args
            .extend(columns.iter().map(|_| FilterValue::Str(like.clone())));
        self
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn args(&self) -> &[FilterValue] {
        &self.args
    }

    pub fn bind_as<'q, O>(
        &self,
        mut q: QueryAs<'q, MySql, O, MySqlArguments>,
    ) -> QueryAs<'q, MySql, O, MySqlArguments> {
        for arg in &self.args {
            q = match arg.clone() {
                FilterValue::U64(v) => q.bind(v),
                FilterValue::I64(v) => q.bind(v),
                FilterValue::F64(v) => q.bind(v),
                FilterValue::Bool(v) => q.bind(v),
                FilterValue::Str(v) => q.bind(v),
                FilterValue::Date(v) => q.bind(v),
                FilterValue::DateTime(v) => q.bind(v),
            };
        }
        q
    }

    pub fn bind_scalar<'q, O>(
        &self,
        mut q: QueryScalar<'q, MySql, O, MySqlArguments>,
    ) -> QueryScalar<'q, MySql, O, MySqlArguments> {
        for arg in &self.args {
            q = match arg.clone() {
                FilterValue::U64(v) => q.bind(v),
                FilterValue::I64(v) => q.bind(v),
                FilterValue::F64(v) => q.bind(v),
                FilterValue::Bool(v) => q.bind(v),
                FilterValue::Str(v) => q.bind(v),
                FilterValue::Date(v) => q.bind(v),
                FilterValue::DateTime(v) => q.bind(v),
            };
        }
        q
    }
}

/// Prefixes every column of a `*_COLUMNS` list with a table alias.
pub fn qualify(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Runs `SELECT COUNT(*)` and the paged `SELECT` over the same filter.
/// `from` may contain joins; `select` is the column list.
pub async fn fetch_page<T>(
    pool: &MySqlPool,
    select: &str,
    from: &str,
    filter: &Filter,
    order_by: &str,
    page: &PageQuery,
) -> AppResult<Page<T>>
where
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let where_clause = filter.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM {from} {where_clause}");
    tracing::debug!(sql = %count_sql, args = ?filter.args(), "Counting rows");
    let total = filter
        .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
        .fetch_one(pool)
        .await?;

    let (limit, offset) = page.limit_offset();
    let data_sql =
        format!("SELECT {select} FROM {from} {where_clause} ORDER BY {order_by} LIMIT ? OFFSET ?");
    let rows = filter
        .bind_as(sqlx::query_as::<_, T>(&data_sql))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(pool)
        .await?;

    Ok(Page::new(rows, page, total))
}

/// Unpaged variant for small result sets.
pub async fn fetch_all<T>(
    pool: &MySqlPool,
    select: &str,
    from: &str,
    filter: &Filter,
    order_by: &str,
) -> AppResult<Vec<T>>
where
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let sql = format!(
        "SELECT {select} FROM {from} {} ORDER BY {order_by}",
        filter.where_clause()
    );
    let rows = filter
        .bind_as(sqlx::query_as::<_, T>(&sql))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_prefixes_each_column() {
        assert_eq!(qualify("id, name,\n code", "s"), "s.id, s.name, s.code");
    }

    #[test]
    fn empty_filter_has_no_where() {
        assert_eq!(Filter::new().where_clause(), "");
    }

    #[test]
    fn conditions_join_with_and() {
        let f = Filter::new()
            .raw("deleted = 0")
            .and("employee_id = ?", 7u64)
            .and_opt::<&str>("status = ?", None)
            .and_opt("category = ?", Some("TRAVEL"));
        assert_eq!(
            f.where_clause(),
            "WHERE deleted = 0 AND employee_id = ? AND category = ?"
        );
        assert_eq!(
            f.args(),
            &[FilterValue::U64(7), FilterValue::Str("TRAVEL".into())]
        );
    }

    #[test]
    fn multi_value_condition_keeps_bind_order() {
        let f = Filter::new().and_all(
            "(lon >= ? AND lon <= ?)",
            vec![1.5.into(), 2.5.into()],
        );
        assert_eq!(f.where_clause(), "WHERE (lon >= ? AND lon <= ?)");
        assert_eq!(f.args(), &[FilterValue::F64(1.5), FilterValue::F64(2.5)]);
    }

    #[test]
    fn search_expands_to_one_like_per_column() {
        let f = Filter::new().search(&["first_name", "email"], Some(" asha "));
        assert_eq!(f.where_clause(), "WHERE (first_name LIKE ? OR email LIKE ?)");
        assert_eq!(f.args().len(), 2);
        assert_eq!(f.args()[0], FilterValue::Str("%asha%".into()));

        assert_eq!(Filter::new().search(&["a"], Some("  ")).where_clause(), "");
    }
}
