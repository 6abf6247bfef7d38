//! Pending/approved/rejected transitions for employee requests.

use chrono::{NaiveDate, NaiveTime};

use crate::error::{AppError, AppResult};
use crate::model::review::RequestStatus;

/// Owners may only change or withdraw a request while it is pending.
pub fn ensure_pending(current: &str, what: &str) -> AppResult<()> {
    match current.parse::<RequestStatus>() {
        Ok(RequestStatus::Pending) => Ok(()),
        _ => Err(AppError::bad_request(format!(
            "Only pending {what} requests can be modified"
        ))),
    }
}

/// A reviewer can only decide pending requests, and only approve or reject.
pub fn review_transition(current: &str, decision: RequestStatus) -> AppResult<RequestStatus> {
    if !matches!(decision, RequestStatus::Approved | RequestStatus::Rejected) {
        return Err(AppError::bad_request(
            "Review decision must be APPROVED or REJECTED",
        ));
    }
    match current.parse::<RequestStatus>() {
        Ok(RequestStatus::Pending) => Ok(decision),
        Ok(other) => Err(AppError::bad_request(format!(
            "Request has already been {}",
            other.as_ref().to_lowercase()
        ))),
        Err(_) => Err(AppError::Internal),
    }
}

/// Checks the outcome of an owner edit guarded by `status = 'PENDING'`.
/// Nothing matched means a reviewer got there first.
pub fn ensure_edit_applied(rows_affected: u64, what: &str) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::bad_request(format!(
            "Only pending {what} requests can be modified"
        )));
    }
    Ok(())
}

/// Same as [`ensure_edit_applied`] for the review itself.
pub fn ensure_review_applied(rows_affected: u64) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::bad_request("Request has already been reviewed"));
    }
    Ok(())
}

pub fn validate_overtime(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    reason: &str,
    today: NaiveDate,
) -> AppResult<()> {
    if date < today {
        return Err(AppError::bad_request("Overtime date cannot be in the past"));
    }
    if end <= start {
        return Err(AppError::bad_request("End time must be after start time"));
    }
    if reason.trim().is_empty() {
        return Err(AppError::bad_request("Reason is required"));
    }
    Ok(())
}

pub fn validate_expense(
    expense_date: NaiveDate,
    amount: f64,
    description: &str,
    today: NaiveDate,
) -> AppResult<()> {
    if expense_date > today {
        return Err(AppError::bad_request("Expense date cannot be in the future"));
    }
    if !(amount > 0.0) || !amount.is_finite() {
        return Err(AppError::bad_request("Amount must be greater than 0"));
    }
    if description.trim().is_empty() {
        return Err(AppError::bad_request("Description is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_editable() {
        assert!(ensure_pending("PENDING", "leave").is_ok());
        let err = ensure_pending("APPROVED", "leave").unwrap_err();
        assert_eq!(err.to_string(), "Only pending leave requests can be modified");
    }

    #[test]
    fn review_accepts_only_final_decisions() {
        assert_eq!(
            review_transition("PENDING", RequestStatus::Approved).unwrap(),
            RequestStatus::Approved
        );
        assert!(review_transition("PENDING", RequestStatus::Cancelled).is_err());
        assert!(review_transition("PENDING", RequestStatus::Pending).is_err());
        let err = review_transition("REJECTED", RequestStatus::Approved).unwrap_err();
        assert_eq!(err.to_string(), "Request has already been rejected");
    }

    #[test]
    fn guarded_writes_that_match_nothing_are_rejected() {
        assert!(ensure_review_applied(1).is_ok());
        let err = ensure_review_applied(0).unwrap_err();
        assert_eq!(err.to_string(), "Request has already been reviewed");
        assert_eq!(
            actix_web::ResponseError::status_code(&err),
            actix_web::http::StatusCode::BAD_REQUEST
        );

        assert!(ensure_edit_applied(1, "expense").is_ok());
        let err = ensure_edit_applied(0, "expense").unwrap_err();
        assert_eq!(err.to_string(), "Only pending expense requests can be modified");
    }

    #[test]
    fn overtime_window() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        assert!(validate_overtime(today, t(18), t(21), "Pour", today).is_ok());
        assert!(validate_overtime(today.pred_opt().unwrap(), t(18), t(21), "Pour", today).is_err());
        assert!(validate_overtime(today, t(21), t(18), "Pour", today).is_err());
        assert!(validate_overtime(today, t(18), t(18), "Pour", today).is_err());
    }

    #[test]
    fn expense_rules() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        assert!(validate_expense(today, 250.0, "Site visit cab", today).is_ok());
        assert!(validate_expense(today.succ_opt().unwrap(), 250.0, "Cab", today).is_err());
        assert!(validate_expense(today, 0.0, "Cab", today).is_err());
        assert!(validate_expense(today, f64::NAN, "Cab", today).is_err());
        assert!(validate_expense(today, 10.0, " ", today).is_err());
    }
}
