use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    TaskAssigned,
    TaskStatusChanged,
    LeaveRequest,
    LeaveApproved,
    LeaveRejected,
    AssignedResponsibility,
    OvertimeRequest,
    OvertimeApproved,
    OvertimeRejected,
    ExpenseRequest,
    ExpenseApproved,
    ExpenseRejected,
    FinalizedSalarySlips,
    BroadcastMessage,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Notification {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    /// JSON object of string values.
    pub data: Option<String>,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: u64,
    pub title: String,
    pub body: String,
    #[schema(example = "LEAVE_APPROVED")]
    pub notification_type: String,
    pub data: HashMap<String, String>,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        let data = n
            .data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        Self {
            id: n.id,
            title: n.title,
            body: n.body,
            notification_type: n.notification_type,
            data,
            is_read: n.is_read,
            read_at: n.read_at,
            created_at: n.created_at,
        }
    }
}

pub const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, body, notification_type, data, is_read, read_at, created_at";
