use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Task {
    pub id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: String,
    pub description: String,
    pub mode_of_travel: String,
    pub site_name: Option<String>,
    pub site_contact_person_name: Option<String>,
    pub site_contact_phone: Option<String>,
    pub status: String,
    /// User who assigned the task.
    pub assigned_by: u64,
    /// Employee who reviewed it.
    pub reviewed_by: Option<u64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_note: Option<String>,
    #[serde(skip_serializing)]
    pub deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const TASK_COLUMNS: &str = "id, start_date, end_date, location, description, mode_of_travel, \
    site_name, site_contact_person_name, site_contact_phone, status, assigned_by, reviewed_by, \
    reviewed_at, review_note, deleted, created_at, updated_at";
