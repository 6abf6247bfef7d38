//! Daily absence marking.
//!
//! For a given day every active employee without an attendance row gets one:
//! `ON_LEAVE`/`HALF_DAY` when an approved leave covers the day, `ABSENT`
//! otherwise. Sundays and holidays are skipped entirely.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::error::AppResult;
use crate::model::attendance::{AttendanceStatus, RecognitionMethod};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    Sunday,
    Holiday,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AbsenceSummary {
    pub date: NaiveDate,
    pub skipped: Option<SkipReason>,
    pub absent: u64,
    pub on_leave: u64,
}

pub fn skip_reason(date: NaiveDate, is_holiday: bool) -> Option<SkipReason> {
    if date.weekday() == Weekday::Sun {
        Some(SkipReason::Sunday)
    } else if is_holiday {
        Some(SkipReason::Holiday)
    } else {
        None
    }
}

/// `leave` is `Some(is_half_day)` when an approved leave covers the day.
pub fn absence_entry(leave: Option<bool>) -> (AttendanceStatus, RecognitionMethod) {
    match leave {
        Some(true) => (AttendanceStatus::HalfDay, RecognitionMethod::AutoLeave),
        Some(false) => (AttendanceStatus::OnLeave, RecognitionMethod::AutoLeave),
        None => (AttendanceStatus::Absent, RecognitionMethod::AutoAbsent),
    }
}

pub async fn is_holiday(pool: &MySqlPool, date: NaiveDate) -> AppResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM holidays WHERE date = ? AND is_active = 1 AND deleted = 0)",
    )
    .bind(date)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

async fn approved_leave_on(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
) -> AppResult<Option<bool>> {
    let half_day = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT is_half_day FROM leaves
        WHERE employee_id = ? AND status = 'APPROVED' AND deleted = 0
          AND start_date <= ? AND end_date >= ?
        ORDER BY is_half_day ASC
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .bind(date)
    .fetch_optional(pool)
    .await?;
    Ok(half_day)
}

#[tracing::instrument(skip(pool))]
pub async fn mark_absent_for_date(pool: &MySqlPool, date: NaiveDate) -> AppResult<AbsenceSummary> {
    let mut summary = AbsenceSummary {
        date,
        skipped: skip_reason(date, is_holiday(pool, date).await?),
        absent: 0,
        on_leave: 0,
    };
    if let Some(reason) = summary.skipped {
        tracing::info!(%date, ?reason, "Absence marking skipped");
        return Ok(summary);
    }

    let missing = sqlx::query_scalar::<_, u64>(
        r#"
        SELECT e.id FROM employees e
        WHERE e.deleted = 0 AND e.employment_status = 'ACTIVE'
          AND NOT EXISTS (SELECT 1 FROM attendance a WHERE a.employee_id = e.id AND a.date = ?)
        "#,
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    for employee_id in missing {
        let leave = approved_leave_on(pool, employee_id, date).await?;
        let (status, method) = absence_entry(leave);
        // INSERT IGNORE: a punch may land between the scan and the insert.
        let inserted = sqlx::query(
            r#"
            INSERT IGNORE INTO attendance
                (employee_id, date, status, recognition_method, working_hours, overtime_hours)
            VALUES (?, ?, ?, ?, 0, 0)
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(status.as_ref())
        .bind(method.as_ref())
        .execute(pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            match leave {
                Some(_) => summary.on_leave += 1,
                None => summary.absent += 1,
            }
        }
    }

    tracing::info!(
        %date,
        absent = summary.absent,
        on_leave = summary.on_leave,
        "Absence marking finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn sundays_and_holidays_are_skipped() {
        assert_eq!(skip_reason(d(2025, 3, 2), false), Some(SkipReason::Sunday));
        assert_eq!(skip_reason(d(2025, 3, 2), true), Some(SkipReason::Sunday));
        assert_eq!(skip_reason(d(2025, 3, 3), true), Some(SkipReason::Holiday));
        assert_eq!(skip_reason(d(2025, 3, 3), false), None);
    }

    #[test]
    fn leave_cover_decides_status() {
        assert_eq!(
            absence_entry(None),
            (AttendanceStatus::Absent, RecognitionMethod::AutoAbsent)
        );
        assert_eq!(
            absence_entry(Some(false)),
            (AttendanceStatus::OnLeave, RecognitionMethod::AutoLeave)
        );
        assert_eq!(
            absence_entry(Some(true)),
            (AttendanceStatus::HalfDay, RecognitionMethod::AutoLeave)
        );
    }
}
