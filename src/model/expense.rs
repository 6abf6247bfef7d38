use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ExpenseCategory {
    Travel,
    Meals,
    Accommodation,
    Supplies,
    Equipment,
    Communication,
    Transportation,
    Entertainment,
    Training,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Expense {
    pub id: u64,
    pub employee_id: u64,
    pub expense_date: NaiveDate,
    pub category: String,
    pub amount: f64,
    pub description: String,
    /// JSON array of receipt URLs.
    #[serde(skip_serializing)]
    pub receipt_urls: Option<String>,
    pub status: String,
    pub reviewed_by: Option<u64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_note: Option<String>,
    #[serde(skip_serializing)]
    pub deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Expense {
    pub fn receipts(&self) -> Vec<String> {
        self.receipt_urls
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

pub const EXPENSE_COLUMNS: &str = "id, employee_id, expense_date, category, amount, description, \
    receipt_urls, status, reviewed_by, reviewed_at, review_note, deleted, created_at, updated_at";
