//! In-app notifications: message texts per event and delivery to users.
//!
//! Delivery is best effort. A failed insert is logged and never fails the
//! operation that triggered it.

use std::collections::BTreeMap;

use sqlx::MySqlPool;

use crate::error::AppResult;
use crate::model::broadcast::BroadcastPriority;
use crate::model::notification::NotificationType;
use crate::model::role::Role;

const BROADCAST_BODY_LIMIT: usize = 150;

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NotificationType,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl Notice {
    fn new(kind: NotificationType, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    fn decided(
        kind_ok: NotificationType,
        kind_rejected: NotificationType,
        what: &str,
        approved: bool,
        reason: Option<&str>,
    ) -> Self {
        let label = capitalize(what);
        if approved {
            Notice::new(
                kind_ok,
                format!("{label} Approved"),
                format!("Your {what} request has been approved"),
            )
        } else {
            let reason = reason.map(str::trim).filter(|r| !r.is_empty());
            let body = match reason {
                Some(r) => format!("Your {what} request has been rejected: {r}"),
                None => format!("Your {what} request has been rejected"),
            };
            let notice = Notice::new(kind_rejected, format!("{label} Rejected"), body);
            match reason {
                Some(r) => notice.with("reason", r),
                None => notice,
            }
        }
    }

    pub fn task_assigned(task_id: u64, task_title: &str) -> Self {
        Notice::new(
            NotificationType::TaskAssigned,
            "New Task Assigned",
            format!("You have been assigned a new task: {task_title}"),
        )
        .with("task_id", task_id)
    }

    pub fn task_reviewed(task_id: u64, task_title: &str, employee_name: &str, status: &str) -> Self {
        Notice::new(
            NotificationType::TaskStatusChanged,
            format!("Task {}", capitalize(&status.to_lowercase())),
            format!(
                "{employee_name} has {} the task: {task_title}",
                status.to_lowercase()
            ),
        )
        .with("task_id", task_id)
        .with("status", status)
    }

    pub fn leave_requested(leave_id: u64, employee_name: &str) -> Self {
        Notice::new(
            NotificationType::LeaveRequest,
            "New Leave Request",
            format!("{employee_name} has submitted a new leave request"),
        )
        .with("leave_id", leave_id)
    }

    pub fn responsibility_assigned(leave_id: u64, employee_name: &str) -> Self {
        Notice::new(
            NotificationType::AssignedResponsibility,
            "Responsibility Assigned",
            format!("{employee_name} has assigned you responsibilities during their leave"),
        )
        .with("leave_id", leave_id)
    }

    pub fn leave_reviewed(leave_id: u64, approved: bool, reason: Option<&str>) -> Self {
        Notice::decided(
            NotificationType::LeaveApproved,
            NotificationType::LeaveRejected,
            "leave",
            approved,
            reason,
        )
        .with("leave_id", leave_id)
    }

    pub fn overtime_requested(overtime_id: u64, employee_name: &str) -> Self {
        Notice::new(
            NotificationType::OvertimeRequest,
            "New Overtime Request",
            format!("{employee_name} has submitted an overtime request"),
        )
        .with("overtime_id", overtime_id)
    }

    pub fn overtime_reviewed(overtime_id: u64, approved: bool, reason: Option<&str>) -> Self {
        Notice::decided(
            NotificationType::OvertimeApproved,
            NotificationType::OvertimeRejected,
            "overtime",
            approved,
            reason,
        )
        .with("overtime_id", overtime_id)
    }

    pub fn expense_requested(expense_id: u64, employee_name: &str, amount: f64) -> Self {
        let amount = format_amount(amount);
        Notice::new(
            NotificationType::ExpenseRequest,
            "New Expense Request",
            format!("{employee_name} has submitted an expense request of ₹{amount}"),
        )
        .with("expense_id", expense_id)
        .with("amount", amount)
    }

    pub fn expense_reviewed(expense_id: u64, approved: bool, reason: Option<&str>) -> Self {
        Notice::decided(
            NotificationType::ExpenseApproved,
            NotificationType::ExpenseRejected,
            "expense",
            approved,
            reason,
        )
        .with("expense_id", expense_id)
    }

    pub fn salary_slip_finalized(slip_id: u64, period: &str) -> Self {
        Notice::new(
            NotificationType::FinalizedSalarySlips,
            "Salary Slip Finalized",
            format!("Your salary slip for {period} has been finalized"),
        )
        .with("salary_slip_id", slip_id)
        .with("period", period)
    }

    pub fn broadcast(
        broadcast_id: u64,
        title: &str,
        message: &str,
        priority: BroadcastPriority,
    ) -> Self {
        let body = if message.chars().count() > BROADCAST_BODY_LIMIT {
            let head: String = message.chars().take(BROADCAST_BODY_LIMIT - 3).collect();
            format!("{head}...")
        } else {
            message.to_string()
        };
        let title = match priority {
            BroadcastPriority::Urgent => format!("🚨 URGENT: {title}"),
            BroadcastPriority::High => format!("⚠️ {title}"),
            _ => format!("📢 {title}"),
        };
        Notice::new(NotificationType::BroadcastMessage, title, body)
            .with("broadcast_id", broadcast_id)
            .with("priority", priority)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whole rupees print without decimals.
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

/// Stores one notification for `user_id`.
pub async fn deliver(pool: &MySqlPool, user_id: u64, notice: &Notice) -> AppResult<u64> {
    let data = serde_json::to_string(&notice.data).unwrap_or_else(|_| "{}".to_string());
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, title, body, notification_type, data)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(&notice.title)
    .bind(&notice.body)
    .bind(notice.kind.as_ref())
    .bind(data)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

/// Sends to every user in `user_ids`, logging and skipping failures.
pub async fn fan_out(pool: &MySqlPool, user_ids: &[u64], notice: &Notice) -> usize {
    let mut sent = 0;
    for &user_id in user_ids {
        match deliver(pool, user_id, notice).await {
            Ok(_) => sent += 1,
            Err(e) => {
                tracing::warn!(user_id, kind = %notice.kind, error = %e, "Notification not delivered");
            }
        }
    }
    tracing::debug!(kind = %notice.kind, sent, total = user_ids.len(), "Notification fan-out");
    sent
}

/// Active Admin and HR accounts.
pub async fn manager_user_ids(pool: &MySqlPool) -> AppResult<Vec<u64>> {
    let ids = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM users WHERE role_id IN (?, ?) AND is_active = 1",
    )
    .bind(Role::Admin.id())
    .bind(Role::Hr.id())
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

pub async fn user_id_for_employee(pool: &MySqlPool, employee_id: u64) -> AppResult<Option<u64>> {
    let id = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM users WHERE employee_id = ? AND is_active = 1 LIMIT 1",
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

pub async fn user_ids_for_employees(pool: &MySqlPool, employee_ids: &[u64]) -> AppResult<Vec<u64>> {
    let mut ids = Vec::with_capacity(employee_ids.len());
    for &employee_id in employee_ids {
        if let Some(user_id) = user_id_for_employee(pool, employee_id).await? {
            ids.push(user_id);
        }
    }
    Ok(ids)
}

/// Users linked to ACTIVE, non-deleted employees.
pub async fn active_employee_user_ids(pool: &MySqlPool) -> AppResult<Vec<u64>> {
    let ids = sqlx::query_scalar::<_, u64>(
        r#"
        SELECT u.id
        FROM users u
        JOIN employees e ON e.id = u.employee_id
        WHERE u.is_active = 1 AND e.deleted = 0 AND e.employment_status = 'ACTIVE'
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// Notify the employee's linked user, if any.
pub async fn notify_employee(pool: &MySqlPool, employee_id: u64, notice: &Notice) {
    match user_id_for_employee(pool, employee_id).await {
        Ok(Some(user_id)) => {
            fan_out(pool, &[user_id], notice).await;
        }
        Ok(None) => tracing::debug!(employee_id, "Employee has no user account to notify"),
        Err(e) => tracing::warn!(employee_id, error = %e, "Could not resolve employee user"),
    }
}

pub async fn notify_managers(pool: &MySqlPool, notice: &Notice) {
    match manager_user_ids(pool).await {
        Ok(ids) => {
            fan_out(pool, &ids, notice).await;
        }
        Err(e) => tracing::warn!(error = %e, "Could not load HR/Admin users"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_texts_include_optional_reason() {
        let ok = Notice::leave_reviewed(4, true, Some("ignored"));
        assert_eq!(ok.kind, NotificationType::LeaveApproved);
        assert_eq!(ok.title, "Leave Approved");
        assert_eq!(ok.body, "Your leave request has been approved");
        assert_eq!(ok.data.get("leave_id").map(String::as_str), Some("4"));

        let no = Notice::overtime_reviewed(9, false, Some("Budget exhausted"));
        assert_eq!(no.kind, NotificationType::OvertimeRejected);
        assert_eq!(no.title, "Overtime Rejected");
        assert_eq!(no.body, "Your overtime request has been rejected: Budget exhausted");
        assert_eq!(no.data.get("reason").map(String::as_str), Some("Budget exhausted"));

        let bare = Notice::expense_reviewed(2, false, Some("  "));
        assert_eq!(bare.body, "Your expense request has been rejected");
        assert!(!bare.data.contains_key("reason"));
    }

    #[test]
    fn request_texts_name_the_employee() {
        let n = Notice::leave_requested(1, "Asha Patil");
        assert_eq!(n.body, "Asha Patil has submitted a new leave request");
        let e = Notice::expense_requested(3, "Asha Patil", 1250.0);
        assert_eq!(e.body, "Asha Patil has submitted an expense request of ₹1250");
        assert_eq!(Notice::expense_requested(3, "A", 99.5).data["amount"], "99.50");
    }

    #[test]
    fn task_review_uses_lowercase_status() {
        let n = Notice::task_reviewed(5, "Survey at Thane", "Ravi Kumar", "APPROVED");
        assert_eq!(n.title, "Task Approved");
        assert_eq!(n.body, "Ravi Kumar has approved the task: Survey at Thane");
        assert_eq!(n.kind, NotificationType::TaskStatusChanged);
    }

    #[test]
    fn salary_slip_notice() {
        let n = Notice::salary_slip_finalized(12, "March 2025");
        assert_eq!(n.body, "Your salary slip for March 2025 has been finalized");
        assert_eq!(n.kind.as_ref(), "FINALIZED_SALARY_SLIPS");
    }

    #[test]
    fn broadcast_title_prefix_and_truncation() {
        let long = "x".repeat(151);
        let n = Notice::broadcast(1, "Site closed", &long, BroadcastPriority::Urgent);
        assert_eq!(n.title, "🚨 URGENT: Site closed");
        assert_eq!(n.body.chars().count(), 150);
        assert!(n.body.ends_with("..."));

        let exact = "y".repeat(150);
        assert_eq!(Notice::broadcast(1, "t", &exact, BroadcastPriority::Low).body, exact);
        assert_eq!(Notice::broadcast(1, "t", "m", BroadcastPriority::High).title, "⚠️ t");
        assert_eq!(Notice::broadcast(1, "t", "m", BroadcastPriority::Normal).title, "📢 t");
        assert_eq!(
            Notice::broadcast(1, "t", "m", BroadcastPriority::High).data["priority"],
            "HIGH"
        );
    }
}
