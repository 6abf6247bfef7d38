use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Holiday {
    pub id: u64,
    #[schema(example = "2026-01-26")]
    pub date: NaiveDate,
    #[schema(example = "Republic Day")]
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const HOLIDAY_COLUMNS: &str =
    "id, date, name, description, is_active, deleted, created_at, updated_at";
