//! Leave application rules and overlap detection against handover colleagues.

use chrono::NaiveDate;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::leave_request::{HalfDayPeriod, LeaveType};

#[derive(Debug, Clone)]
pub struct LeaveDraft<'a> {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_half_day: bool,
    pub half_day_period: Option<HalfDayPeriod>,
    pub medical_certificate_url: Option<&'a str>,
    pub reason: &'a str,
}

/// Checks the draft against `today` and returns its length in days.
pub fn validate_leave(draft: &LeaveDraft<'_>, today: NaiveDate) -> AppResult<f64> {
    if draft.start_date < today {
        return Err(AppError::bad_request("Start date cannot be in the past"));
    }
    if draft.end_date < draft.start_date {
        return Err(AppError::bad_request("End date cannot be before start date"));
    }
    if draft.reason.trim().is_empty() {
        return Err(AppError::bad_request("Reason is required"));
    }
    if draft.leave_type == LeaveType::Medical
        && draft.medical_certificate_url.is_none_or(|u| u.trim().is_empty())
    {
        return Err(AppError::bad_request(
            "Medical certificate is required for medical leave",
        ));
    }
    if draft.is_half_day {
        if draft.half_day_period.is_none() {
            return Err(AppError::bad_request(
                "Half day period is required when applying for half day leave",
            ));
        }
        if draft.start_date != draft.end_date {
            return Err(AppError::bad_request(
                "Half day leave can only be applied for a single day",
            ));
        }
    }
    Ok(leave_days(draft.start_date, draft.end_date, draft.is_half_day))
}

pub fn leave_days(start: NaiveDate, end: NaiveDate, is_half_day: bool) -> f64 {
    if is_half_day {
        0.5
    } else {
        ((end - start).num_days() + 1) as f64
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    ExactOverlap,
    CompleteOverlap,
    PartialOverlap,
}

/// How range `b` overlaps range `a`; `None` when they are disjoint.
pub fn classify_overlap(
    a: (NaiveDate, NaiveDate),
    b: (NaiveDate, NaiveDate),
) -> Option<ConflictType> {
    let ((a_start, a_end), (b_start, b_end)) = (a, b);
    if a_start == b_start && a_end == b_end {
        Some(ConflictType::ExactOverlap)
    } else if (a_start < b_start && a_end > b_end) || (b_start < a_start && b_end > a_end) {
        Some(ConflictType::CompleteOverlap)
    } else if a_start <= b_end && a_end >= b_start {
        Some(ConflictType::PartialOverlap)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn draft(start: u32, end: u32) -> LeaveDraft<'static> {
        LeaveDraft {
            leave_type: LeaveType::Casual,
            start_date: d(start),
            end_date: d(end),
            is_half_day: false,
            half_day_period: None,
            medical_certificate_url: None,
            reason: "Family function",
        }
    }

    #[test]
    fn inclusive_day_count() {
        assert_eq!(validate_leave(&draft(10, 12), d(1)).unwrap(), 3.0);
        assert_eq!(validate_leave(&draft(10, 10), d(10)).unwrap(), 1.0);
    }

    #[test]
    fn rejects_past_and_inverted_ranges() {
        assert!(validate_leave(&draft(10, 12), d(11)).is_err());
        assert!(validate_leave(&draft(12, 10), d(1)).is_err());
    }

    #[test]
    fn medical_leave_needs_certificate() {
        let mut l = draft(10, 11);
        l.leave_type = LeaveType::Medical;
        assert!(validate_leave(&l, d(1)).is_err());
        l.medical_certificate_url = Some("  ");
        assert!(validate_leave(&l, d(1)).is_err());
        l.medical_certificate_url = Some("https://files.civildesk.in/cert.pdf");
        assert!(validate_leave(&l, d(1)).is_ok());
    }

    #[test]
    fn half_day_rules() {
        let mut l = draft(10, 10);
        l.is_half_day = true;
        assert!(validate_leave(&l, d(1)).is_err());
        l.half_day_period = Some(HalfDayPeriod::FirstHalf);
        assert_eq!(validate_leave(&l, d(1)).unwrap(), 0.5);
        l.end_date = d(11);
        assert!(validate_leave(&l, d(1)).is_err());
    }

    #[test]
    fn overlap_classification() {
        assert_eq!(classify_overlap((d(5), d(8)), (d(5), d(8))), Some(ConflictType::ExactOverlap));
        assert_eq!(classify_overlap((d(1), d(10)), (d(3), d(5))), Some(ConflictType::CompleteOverlap));
        assert_eq!(classify_overlap((d(3), d(5)), (d(1), d(10))), Some(ConflictType::CompleteOverlap));
        assert_eq!(classify_overlap((d(1), d(5)), (d(5), d(9))), Some(ConflictType::PartialOverlap));
        assert_eq!(classify_overlap((d(1), d(5)), (d(1), d(9))), Some(ConflictType::PartialOverlap));
        assert_eq!(classify_overlap((d(1), d(4)), (d(5), d(9))), None);
    }
}
