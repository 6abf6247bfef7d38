//! Normalized attendance for holidays.
//!
//! An active holiday on a working day counts as a full office day for every
//! active employee who has no record of their own. Those rows are tagged with
//! the `HOLIDAY` method so they can be removed again without touching real
//! punches.

use chrono::{Datelike, NaiveDate, Weekday};
use sqlx::MySqlPool;

use crate::error::AppResult;
use crate::model::attendance::{AttendanceStatus, RecognitionMethod};
use crate::service::work_hours::{DayHours, Punches, compute_day_hours};

pub fn holiday_punches(date: NaiveDate) -> Punches {
    Punches {
        check_in: date.and_hms_opt(9, 0, 0),
        lunch_out: date.and_hms_opt(13, 0, 0),
        lunch_in: date.and_hms_opt(14, 0, 0),
        check_out: date.and_hms_opt(18, 0, 0),
    }
}

pub fn applies_to(date: NaiveDate) -> bool {
    date.weekday() != Weekday::Sun
}

/// Inserts normalized rows for `date`; returns how many were created.
pub async fn apply_holiday(pool: &MySqlPool, date: NaiveDate) -> AppResult<u64> {
    if !applies_to(date) {
        return Ok(0);
    }
    let punches = holiday_punches(date);
    let DayHours {
        working_hours,
        overtime_hours,
    } = compute_day_hours(date, &punches);

    let created = sqlx::query(
        r#"
        INSERT IGNORE INTO attendance
            (employee_id, date, check_in_time, lunch_out_time, lunch_in_time, check_out_time,
             status, recognition_method, working_hours, overtime_hours)
        SELECT e.id, ?, ?, ?, ?, ?, ?, ?, ?, ?
        FROM employees e
        WHERE e.deleted = 0 AND e.employment_status = 'ACTIVE'
          AND NOT EXISTS (SELECT 1 FROM attendance a WHERE a.employee_id = e.id AND a.date = ?)
        "#,
    )
    .bind(date)
    .bind(punches.check_in)
    .bind(punches.lunch_out)
    .bind(punches.lunch_in)
    .bind(punches.check_out)
    .bind(AttendanceStatus::Present.as_ref())
    .bind(RecognitionMethod::Holiday.as_ref())
    .bind(working_hours)
    .bind(overtime_hours)
    .bind(date)
    .execute(pool)
    .await?
    .rows_affected();

    tracing::info!(%date, created, "Holiday attendance normalized");
    Ok(created)
}

/// Removes only the normalized rows for `date`.
pub async fn clear_holiday(pool: &MySqlPool, date: NaiveDate) -> AppResult<u64> {
    let removed = sqlx::query("DELETE FROM attendance WHERE date = ? AND recognition_method = ?")
        .bind(date)
        .bind(RecognitionMethod::Holiday.as_ref())
        .execute(pool)
        .await?
        .rows_affected();
    tracing::info!(%date, removed, "Holiday attendance removed");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_day_is_a_full_office_day() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let hours = compute_day_hours(date, &holiday_punches(date));
        assert_eq!(hours.working_hours, 8.0);
        assert_eq!(hours.overtime_hours, 0.0);
    }

    #[test]
    fn sunday_holidays_are_not_normalized() {
        assert!(!applies_to(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()));
        assert!(applies_to(NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()));
    }
}
