use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SiteAssignment {
    pub id: u64,
    pub employee_id: u64,
    pub site_id: u64,
    pub assignment_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_primary: bool,
    pub is_active: bool,
    pub assigned_by: Option<u64>,
    pub created_at: NaiveDateTime,
}

impl SiteAssignment {
    /// Active and within its date window on `day`.
    pub fn is_valid_on(&self, day: NaiveDate) -> bool {
        self.is_active
            && self.assignment_date <= day
            && self.end_date.is_none_or(|end| end >= day)
    }
}

pub const ASSIGNMENT_COLUMNS: &str =
    "id, employee_id, site_id, assignment_date, end_date, is_primary, is_active, assigned_by, created_at";

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(start: NaiveDate, end: Option<NaiveDate>, active: bool) -> SiteAssignment {
        SiteAssignment {
            id: 1,
            employee_id: 1,
            site_id: 1,
            assignment_date: start,
            end_date: end,
            is_primary: false,
            is_active: active,
            assigned_by: None,
            created_at: start.and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn validity_window_is_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        let a = assignment(d(10), Some(d(20)), true);
        assert!(!a.is_valid_on(d(9)));
        assert!(a.is_valid_on(d(10)));
        assert!(a.is_valid_on(d(20)));
        assert!(!a.is_valid_on(d(21)));

        assert!(assignment(d(10), None, true).is_valid_on(d(31)));
        assert!(!assignment(d(10), None, false).is_valid_on(d(15)));
    }
}
