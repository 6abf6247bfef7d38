use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LeaveType {
    Sick,
    Casual,
    Annual,
    Maternity,
    Paternity,
    Medical,
    Emergency,
    Unpaid,
    CompensatoryOff,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum HalfDayPeriod {
    FirstHalf,
    SecondHalf,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_half_day: bool,
    pub half_day_period: Option<String>,
    pub contact_number: Option<String>,
    /// Comma separated employee ids.
    pub handover_employee_ids: Option<String>,
    pub reason: String,
    pub medical_certificate_url: Option<String>,
    pub total_days: f64,
    pub status: String,
    pub reviewed_by: Option<u64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub review_note: Option<String>,
    #[serde(skip_serializing)]
    pub deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl LeaveRequest {
    pub fn handover_ids(&self) -> Vec<u64> {
        parse_id_list(self.handover_employee_ids.as_deref())
    }
}

pub fn parse_id_list(raw: Option<&str>) -> Vec<u64> {
    raw.unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect()
}

pub fn join_id_list(ids: &[u64]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    Some(
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(","),
    )
}

pub const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, is_half_day, \
    half_day_period, contact_number, handover_employee_ids, reason, medical_certificate_url, \
    total_days, status, reviewed_by, reviewed_at, review_note, deleted, created_at, updated_at";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_skips_garbage() {
        assert_eq!(parse_id_list(Some("3, 4,x,,9")), vec![3, 4, 9]);
        assert!(parse_id_list(None).is_empty());
        assert_eq!(join_id_list(&[3, 4]).as_deref(), Some("3,4"));
        assert_eq!(join_id_list(&[]), None);
    }

    #[test]
    fn leave_type_parses_any_case() {
        assert_eq!("compensatory_off".parse::<LeaveType>().unwrap(), LeaveType::CompensatoryOff);
        assert_eq!(LeaveType::Medical.to_string(), "MEDICAL");
    }
}
