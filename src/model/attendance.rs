use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AttendanceStatus {
    Present,
    Absent,
    OnLeave,
    HalfDay,
    Late,
}

/// How the attendance row came to exist.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum RecognitionMethod {
    GpsBased,
    Manual,
    Holiday,
    AutoAbsent,
    AutoLeave,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in_time: Option<NaiveDateTime>,
    pub lunch_out_time: Option<NaiveDateTime>,
    pub lunch_in_time: Option<NaiveDateTime>,
    pub check_out_time: Option<NaiveDateTime>,
    #[schema(example = "PRESENT")]
    pub status: String,
    #[schema(example = "GPS_BASED")]
    pub recognition_method: String,
    pub working_hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, check_in_time, lunch_out_time, \
    lunch_in_time, check_out_time, status, recognition_method, working_hours, overtime_hours, \
    notes, created_at, updated_at";
