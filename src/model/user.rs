use chrono::NaiveDateTime;
use serde::Serialize;

/// Login account. `employee_id` links it to an employee record; HR and
/// admin accounts may have none.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role_id: u8,
    pub employee_id: Option<u64>,
    pub is_active: bool,
    pub last_login_at: Option<NaiveDateTime>,
}

pub const USER_COLUMNS: &str =
    "id, username, password, role_id, employee_id, is_active, last_login_at";
