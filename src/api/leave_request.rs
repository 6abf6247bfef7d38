use crate::{
    api::employee::{employee_name, find_employee},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        employee::{EMPLOYEE_COLUMNS, Employee},
        leave_request::{HalfDayPeriod, LEAVE_COLUMNS, LeaveRequest, LeaveType, join_id_list},
        review::{RequestStatus, ReviewRequest},
    },
    service::{
        leave::{ConflictType, LeaveDraft, classify_overlap, validate_leave},
        notify::{self, Notice},
        review::{ensure_edit_applied, ensure_pending, ensure_review_applied, review_transition},
    },
    utils::{
        pagination::{Page, PageQuery},
        query_filter::{Filter, fetch_all, fetch_page, qualify},
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LeaveApplication {
    pub leave_type: LeaveType,
    #[schema(value_type = String, format = "date", example = "2026-02-10")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-02-12")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_half_day: bool,
    pub half_day_period: Option<HalfDayPeriod>,
    pub contact_number: Option<String>,
    /// Colleagues covering the applicant's work
    #[serde(default)]
    pub handover_employee_ids: Vec<u64>,
    #[schema(example = "Sister's wedding")]
    pub reason: String,
    pub medical_certificate_url: Option<String>,
}

impl LeaveApplication {
    fn draft(&self) -> LeaveDraft<'_> {
        LeaveDraft {
            leave_type: self.leave_type,
            start_date: self.start_date,
            end_date: self.end_date,
            is_half_day: self.is_half_day,
            half_day_period: self.half_day_period,
            medical_certificate_url: self.medical_certificate_url.as_deref(),
            reason: &self.reason,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaveListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<RequestStatus>,
    pub leave_type: Option<LeaveType>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HandoverEmployee {
    pub id: u64,
    pub employee_code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveConflict {
    pub employee_id: u64,
    pub employee_name: String,
    pub leave_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub status: String,
    pub conflict_type: ConflictType,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveView {
    #[serde(flatten)]
    pub leave: LeaveRequest,
    pub employee_name: String,
    pub handover_employees: Vec<HandoverEmployee>,
    pub conflicts: Vec<LeaveConflict>,
}

fn dedup_ids(ids: &[u64]) -> Vec<u64> {
    let mut out = Vec::with_capacity(ids.len());
    for &id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Handover colleagues must exist, be active and not be the applicant.
async fn load_handover(
    pool: &MySqlPool,
    applicant_id: u64,
    ids: &[u64],
) -> AppResult<Vec<Employee>> {
    let mut employees = Vec::with_capacity(ids.len());
    for &id in ids {
        if id == applicant_id {
            return Err(AppError::bad_request(
                "You cannot assign yourself as a handover employee",
            ));
        }
        let employee = match find_employee(pool, id).await {
            Err(AppError::NotFound(_)) => {
                return Err(AppError::bad_request(format!("Handover employee {id} not found")));
            }
            other => other?,
        };
        if !employee.is_active() {
            return Err(AppError::bad_request(format!(
                "Handover employee {} is not active",
                employee.full_name()
            )));
        }
        employees.push(employee);
    }
    Ok(employees)
}

/// Pending or approved leaves of `employee_ids` overlapping the range.
async fn conflicts_for(
    pool: &MySqlPool,
    employee_ids: &[u64],
    range: (NaiveDate, NaiveDate),
    exclude_leave: u64,
) -> AppResult<Vec<LeaveConflict>> {
    let mut conflicts = Vec::new();
    for &employee_id in employee_ids {
        let leaves = fetch_all::<LeaveRequest>(
            pool,
            LEAVE_COLUMNS,
            "leaves",
            &Filter::new()
                .and("employee_id = ?", employee_id)
                .raw("deleted = 0")
                .raw("status IN ('PENDING', 'APPROVED')")
                .and("id <> ?", exclude_leave)
                .and("start_date <= ?", range.1)
                .and("end_date >= ?", range.0),
            "start_date",
        )
        .await?;
        if leaves.is_empty() {
            continue;
        }
        let name = employee_name(pool, employee_id).await;
        conflicts.extend(leaves.into_iter().filter_map(|other| {
            classify_overlap(range, (other.start_date, other.end_date)).map(|conflict_type| {
                LeaveConflict {
                    employee_id,
                    employee_name: name.clone(),
                    leave_id: other.id,
                    start_date: other.start_date,
                    end_date: other.end_date,
                    status: other.status,
                    conflict_type,
                }
            })
        }));
    }
    Ok(conflicts)
}

/// `conflict_ids` are the employees whose leaves count as conflicts.
async fn leave_view(
    pool: &MySqlPool,
    leave: LeaveRequest,
    conflict_ids: &[u64],
) -> AppResult<LeaveView> {
    let mut handover_employees = Vec::new();
    for id in leave.handover_ids() {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        if let Some(e) = sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
        {
            handover_employees.push(HandoverEmployee {
                id: e.id,
                name: e.full_name(),
                employee_code: e.employee_code,
            });
        }
    }
    let conflicts = conflicts_for(
        pool,
        conflict_ids,
        (leave.start_date, leave.end_date),
        leave.id,
    )
    .await?;
    Ok(LeaveView {
        employee_name: employee_name(pool, leave.employee_id).await,
        handover_employees,
        conflicts,
        leave,
    })
}

async fn default_view(pool: &MySqlPool, leave: LeaveRequest) -> AppResult<LeaveView> {
    let ids = leave.handover_ids();
    leave_view(pool, leave, &ids).await
}

async fn find_leave(pool: &MySqlPool, leave_id: u64) -> AppResult<LeaveRequest> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ? AND deleted = 0");
    sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(leave_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Leave request not found"))
}

/// Loads a leave the caller owns and may still change.
async fn owned_pending(pool: &MySqlPool, auth: &AuthUser, leave_id: u64) -> AppResult<LeaveRequest> {
    let employee_id = auth.require_employee()?;
    let leave = find_leave(pool, leave_id).await?;
    if leave.employee_id != employee_id {
        return Err(AppError::forbidden("You can only modify your own leave requests"));
    }
    ensure_pending(&leave.status, "leave")?;
    Ok(leave)
}

async fn views(
    pool: &MySqlPool,
    leaves: Vec<LeaveRequest>,
) -> AppResult<Vec<LeaveView>> {
    let mut out = Vec::with_capacity(leaves.len());
    for leave in leaves {
        out.push(default_view(pool, leave).await?);
    }
    Ok(out)
}

#[utoipa::path(
    post,
    path = "/api/leaves",
    request_body = LeaveApplication,
    responses(
        (status = 201, description = "Leave applied", body = LeaveView),
        (status = 400, description = "Invalid application")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<LeaveApplication>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    let total_days = validate_leave(&payload.draft(), Local::now().date_naive())?;
    let handover_ids = dedup_ids(&payload.handover_employee_ids);
    load_handover(pool, employee_id, &handover_ids).await?;

    let leave_id = sqlx::query(
        r#"
        INSERT INTO leaves
            (employee_id, leave_type, start_date, end_date, is_half_day, half_day_period,
             contact_number, handover_employee_ids, reason, medical_certificate_url, total_days,
             status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.is_half_day)
    .bind(payload.half_day_period.filter(|_| payload.is_half_day).map(|p| p.to_string()))
    .bind(&payload.contact_number)
    .bind(join_id_list(&handover_ids))
    .bind(payload.reason.trim())
    .bind(&payload.medical_certificate_url)
    .bind(total_days)
    .bind(RequestStatus::Pending.as_ref())
    .execute(pool)
    .await
    .map_err(AppError::from)?
    .last_insert_id();

    let view = default_view(pool, find_leave(pool, leave_id).await?).await?;
    notify::notify_managers(pool, &Notice::leave_requested(leave_id, &view.employee_name)).await;
    let handover_users = notify::user_ids_for_employees(pool, &handover_ids)
        .await
        .unwrap_or_default();
    notify::fan_out(
        pool,
        &handover_users,
        &Notice::responsibility_assigned(leave_id, &view.employee_name),
    )
    .await;

    info!(leave_id, employee_id, total_days, conflicts = view.conflicts.len(), "Leave applied");
    Ok(HttpResponse::Created().json(view))
}

#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    request_body = LeaveApplication,
    responses(
        (status = 200, description = "Leave updated", body = LeaveView),
        (status = 400, description = "Not pending or invalid"),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<LeaveApplication>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let leave = owned_pending(pool, &auth, path.into_inner()).await?;
    let total_days = validate_leave(&payload.draft(), Local::now().date_naive())?;
    let handover_ids = dedup_ids(&payload.handover_employee_ids);
    load_handover(pool, leave.employee_id, &handover_ids).await?;

    let updated = sqlx::query(
        r#"
        UPDATE leaves SET
            leave_type = ?, start_date = ?, end_date = ?, is_half_day = ?, half_day_period = ?,
            contact_number = ?, handover_employee_ids = ?, reason = ?,
            medical_certificate_url = ?, total_days = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(payload.leave_type.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.is_half_day)
    .bind(payload.half_day_period.filter(|_| payload.is_half_day).map(|p| p.to_string()))
    .bind(&payload.contact_number)
    .bind(join_id_list(&handover_ids))
    .bind(payload.reason.trim())
    .bind(&payload.medical_certificate_url)
    .bind(total_days)
    .bind(leave.id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    ensure_edit_applied(updated.rows_affected(), "leave")?;

    // Only colleagues added by this edit hear about it.
    let previous = leave.handover_ids();
    let added: Vec<u64> = handover_ids
        .iter()
        .copied()
        .filter(|id| !previous.contains(id))
        .collect();
    let view = default_view(pool, find_leave(pool, leave.id).await?).await?;
    if !added.is_empty() {
        let users = notify::user_ids_for_employees(pool, &added)
            .await
            .unwrap_or_default();
        notify::fan_out(
            pool,
            &users,
            &Notice::responsibility_assigned(leave.id, &view.employee_name),
        )
        .await;
    }

    info!(leave_id = leave.id, "Leave updated");
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    delete,
    path = "/api/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    responses(
        (status = 200, description = "Leave withdrawn", body = Object, example = json!({"message": "Leave request deleted"})),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = owned_pending(pool.get_ref(), &auth, path.into_inner()).await?;
    let deleted = sqlx::query("UPDATE leaves SET deleted = 1 WHERE id = ? AND status = 'PENDING'")
        .bind(leave.id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    ensure_edit_applied(deleted.rows_affected(), "leave")?;
    info!(leave_id = leave.id, "Leave deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave request deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/leaves/my",
    responses((status = 200, description = "My leave requests", body = [LeaveView])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    let leaves = fetch_all::<LeaveRequest>(
        pool,
        LEAVE_COLUMNS,
        "leaves",
        &Filter::new()
            .and("employee_id = ?", employee_id)
            .raw("deleted = 0"),
        "created_at DESC",
    )
    .await?;
    Ok(HttpResponse::Ok().json(views(pool, leaves).await?))
}

/// Leaves where the caller covers for a colleague. Conflicts are the
/// caller's own overlapping leaves.
#[utoipa::path(
    get,
    path = "/api/leaves/responsibilities",
    responses((status = 200, description = "Leaves naming me as handover", body = [LeaveView])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_responsibilities(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    let leaves = fetch_all::<LeaveRequest>(
        pool,
        LEAVE_COLUMNS,
        "leaves",
        &Filter::new()
            .and("FIND_IN_SET(?, handover_employee_ids) > 0", employee_id.to_string())
            .raw("deleted = 0")
            .raw("status IN ('PENDING', 'APPROVED')"),
        "start_date",
    )
    .await?;

    let mut out = Vec::with_capacity(leaves.len());
    for leave in leaves {
        out.push(leave_view(pool, leave, &[employee_id]).await?);
    }
    Ok(HttpResponse::Ok().json(out))
}

#[utoipa::path(
    get,
    path = "/api/leaves",
    params(LeaveListQuery),
    responses((status = 200, description = "Paginated leave requests (data, page, per_page, total)", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let filter = Filter::new()
        .raw("l.deleted = 0")
        .and_opt("l.status = ?", query.status.map(|s| s.to_string()))
        .and_opt("l.leave_type = ?", query.leave_type.map(|t| t.to_string()))
        .and_opt("e.department = ?", query.department.as_deref());
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let leaves = fetch_page::<LeaveRequest>(
        pool,
        &qualify(LEAVE_COLUMNS, "l"),
        "leaves l JOIN employees e ON e.id = l.employee_id",
        &filter,
        "l.created_at DESC",
        &page,
    )
    .await?;

    let Page {
        data,
        page,
        per_page,
        total,
    } = leaves;
    Ok(HttpResponse::Ok().json(Page {
        data: views(pool, data).await?,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    responses(
        (status = 200, description = "Leave request", body = LeaveView),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let leave = find_leave(pool, path.into_inner()).await?;
    let is_handover = auth
        .employee_id
        .is_some_and(|me| leave.handover_ids().contains(&me));
    if !auth.can_view_employee(leave.employee_id) && !is_handover {
        return Err(AppError::forbidden("Not allowed to view this leave request").into());
    }
    Ok(HttpResponse::Ok().json(default_view(pool, leave).await?))
}

#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}/review",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Leave reviewed", body = LeaveView),
        (status = 400, description = "Not pending or invalid decision"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn review_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReviewRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let leave = find_leave(pool, path.into_inner()).await?;
    let decision = review_transition(&leave.status, payload.status)?;

    let reviewed = sqlx::query(
        r#"
        UPDATE leaves SET status = ?, reviewed_by = ?, reviewed_at = ?, review_note = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(decision.as_ref())
    .bind(auth.user_id)
    .bind(Local::now().naive_local())
    .bind(&payload.note)
    .bind(leave.id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    ensure_review_applied(reviewed.rows_affected())?;

    notify::notify_employee(
        pool,
        leave.employee_id,
        &Notice::leave_reviewed(
            leave.id,
            decision == RequestStatus::Approved,
            payload.note.as_deref(),
        ),
    )
    .await;

    info!(leave_id = leave.id, decision = %decision, reviewer = auth.user_id, "Leave reviewed");
    Ok(HttpResponse::Ok().json(default_view(pool, find_leave(pool, leave.id).await?).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handover_ids_are_deduplicated_in_order() {
        assert_eq!(dedup_ids(&[4, 2, 4, 9, 2]), vec![4, 2, 9]);
        assert!(dedup_ids(&[]).is_empty());
    }

    #[test]
    fn application_maps_to_draft() {
        let app: LeaveApplication = serde_json::from_value(json!({
            "leave_type": "CASUAL",
            "start_date": "2026-02-10",
            "end_date": "2026-02-10",
            "is_half_day": true,
            "half_day_period": "FIRST_HALF",
            "reason": "Bank work"
        }))
        .unwrap();
        let draft = app.draft();
        assert_eq!(draft.leave_type, LeaveType::Casual);
        assert_eq!(draft.half_day_period, Some(HalfDayPeriod::FirstHalf));
        assert!(app.handover_employee_ids.is_empty());
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_eq!(validate_leave(&draft, today).unwrap(), 0.5);
    }
}
