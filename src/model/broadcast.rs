use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BroadcastPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct BroadcastMessage {
    pub id: u64,
    pub title: String,
    pub message: String,
    #[schema(example = "NORMAL")]
    pub priority: String,
    pub is_active: bool,
    pub created_by: u64,
    pub updated_by: Option<u64>,
    #[serde(skip_serializing)]
    pub deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const BROADCAST_COLUMNS: &str =
    "id, title, message, priority, is_active, created_by, updated_by, deleted, created_at, updated_at";
