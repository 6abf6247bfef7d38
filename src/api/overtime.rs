use crate::{
    api::employee::employee_name,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        overtime::{OVERTIME_COLUMNS, Overtime},
        review::{RequestStatus, ReviewRequest},
    },
    service::{
        notify::{self, Notice},
        review::{
            ensure_edit_applied, ensure_pending, ensure_review_applied, review_transition,
            validate_overtime,
        },
    },
    utils::{
        pagination::{Page, PageQuery},
        query_filter::{Filter, fetch_all, fetch_page, qualify},
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct OvertimeApplication {
    #[schema(value_type = String, format = "date", example = "2026-02-10")]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "18:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "21:00:00")]
    pub end_time: NaiveTime,
    #[schema(example = "Slab casting")]
    pub reason: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OvertimeListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<RequestStatus>,
    pub department: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OvertimeView {
    #[serde(flatten)]
    pub overtime: Overtime,
    pub employee_name: String,
}

async fn view(pool: &MySqlPool, overtime: Overtime) -> OvertimeView {
    OvertimeView {
        employee_name: employee_name(pool, overtime.employee_id).await,
        overtime,
    }
}

async fn views(pool: &MySqlPool, rows: Vec<Overtime>) -> Vec<OvertimeView> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(view(pool, row).await);
    }
    out
}

async fn find_overtime(pool: &MySqlPool, overtime_id: u64) -> AppResult<Overtime> {
    let sql = format!("SELECT {OVERTIME_COLUMNS} FROM overtimes WHERE id = ? AND deleted = 0");
    sqlx::query_as::<_, Overtime>(&sql)
        .bind(overtime_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Overtime request not found"))
}

async fn owned_pending(pool: &MySqlPool, auth: &AuthUser, overtime_id: u64) -> AppResult<Overtime> {
    let employee_id = auth.require_employee()?;
    let overtime = find_overtime(pool, overtime_id).await?;
    if overtime.employee_id != employee_id {
        return Err(AppError::forbidden("You can only modify your own overtime requests"));
    }
    ensure_pending(&overtime.status, "overtime")?;
    Ok(overtime)
}

#[utoipa::path(
    post,
    path = "/api/overtimes",
    request_body = OvertimeApplication,
    responses(
        (status = 201, description = "Overtime applied", body = OvertimeView),
        (status = 400, description = "Invalid application")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn apply_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<OvertimeApplication>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    validate_overtime(
        payload.date,
        payload.start_time,
        payload.end_time,
        &payload.reason,
        Local::now().date_naive(),
    )?;

    let overtime_id = sqlx::query(
        "INSERT INTO overtimes (employee_id, date, start_time, end_time, reason, status) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(employee_id)
    .bind(payload.date)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.reason.trim())
    .bind(RequestStatus::Pending.as_ref())
    .execute(pool)
    .await
    .map_err(AppError::from)?
    .last_insert_id();

    let created = view(pool, find_overtime(pool, overtime_id).await?).await;
    notify::notify_managers(pool, &Notice::overtime_requested(overtime_id, &created.employee_name))
        .await;
    info!(overtime_id, employee_id, "Overtime applied");
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    put,
    path = "/api/overtimes/{overtime_id}",
    params(("overtime_id" = u64, Path, description = "Overtime ID")),
    request_body = OvertimeApplication,
    responses(
        (status = 200, description = "Overtime updated", body = OvertimeView),
        (status = 400, description = "Not pending or invalid"),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn update_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<OvertimeApplication>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let overtime = owned_pending(pool, &auth, path.into_inner()).await?;
    validate_overtime(
        payload.date,
        payload.start_time,
        payload.end_time,
        &payload.reason,
        Local::now().date_naive(),
    )?;

    let updated = sqlx::query(
        "UPDATE overtimes SET date = ?, start_time = ?, end_time = ?, reason = ? \
         WHERE id = ? AND status = 'PENDING'",
    )
    .bind(payload.date)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.reason.trim())
    .bind(overtime.id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    ensure_edit_applied(updated.rows_affected(), "overtime")?;

    Ok(HttpResponse::Ok().json(view(pool, find_overtime(pool, overtime.id).await?).await))
}

#[utoipa::path(
    delete,
    path = "/api/overtimes/{overtime_id}",
    params(("overtime_id" = u64, Path, description = "Overtime ID")),
    responses(
        (status = 200, description = "Overtime withdrawn", body = Object, example = json!({"message": "Overtime request deleted"})),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn delete_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let overtime = owned_pending(pool.get_ref(), &auth, path.into_inner()).await?;
    let deleted = sqlx::query("UPDATE overtimes SET deleted = 1 WHERE id = ? AND status = 'PENDING'")
        .bind(overtime.id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    ensure_edit_applied(deleted.rows_affected(), "overtime")?;
    info!(overtime_id = overtime.id, "Overtime deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Overtime request deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/overtimes/my",
    responses((status = 200, description = "My overtime requests", body = [OvertimeView])),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn my_overtimes(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    let rows = fetch_all::<Overtime>(
        pool,
        OVERTIME_COLUMNS,
        "overtimes",
        &Filter::new()
            .and("employee_id = ?", employee_id)
            .raw("deleted = 0"),
        "date DESC, created_at DESC",
    )
    .await?;
    Ok(HttpResponse::Ok().json(views(pool, rows).await))
}

#[utoipa::path(
    get,
    path = "/api/overtimes",
    params(OvertimeListQuery),
    responses((status = 200, description = "Paginated overtime requests (data, page, per_page, total)", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn list_overtimes(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OvertimeListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let filter = Filter::new()
        .raw("o.deleted = 0")
        .and_opt("o.status = ?", query.status.map(|s| s.to_string()))
        .and_opt("e.department = ?", query.department.as_deref());
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let Page {
        data,
        page,
        per_page,
        total,
    } = fetch_page::<Overtime>(
        pool,
        &qualify(OVERTIME_COLUMNS, "o"),
        "overtimes o JOIN employees e ON e.id = o.employee_id",
        &filter,
        "o.created_at DESC",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(Page {
        data: views(pool, data).await,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/overtimes/{overtime_id}",
    params(("overtime_id" = u64, Path, description = "Overtime ID")),
    responses(
        (status = 200, description = "Overtime request", body = OvertimeView),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Overtime not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn get_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let overtime = find_overtime(pool, path.into_inner()).await?;
    if !auth.can_view_employee(overtime.employee_id) {
        return Err(AppError::forbidden("Not allowed to view this overtime request").into());
    }
    Ok(HttpResponse::Ok().json(view(pool, overtime).await))
}

#[utoipa::path(
    put,
    path = "/api/overtimes/{overtime_id}/review",
    params(("overtime_id" = u64, Path, description = "Overtime ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Overtime reviewed", body = OvertimeView),
        (status = 400, description = "Not pending or invalid decision"),
        (status = 404, description = "Overtime not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Overtime"
)]
pub async fn review_overtime(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReviewRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let overtime = find_overtime(pool, path.into_inner()).await?;
    let decision = review_transition(&overtime.status, payload.status)?;

    let reviewed = sqlx::query(
        r#"
        UPDATE overtimes SET status = ?, reviewed_by = ?, reviewed_at = ?, review_note = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(decision.as_ref())
    .bind(auth.user_id)
    .bind(Local::now().naive_local())
    .bind(&payload.note)
    .bind(overtime.id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    ensure_review_applied(reviewed.rows_affected())?;

    notify::notify_employee(
        pool,
        overtime.employee_id,
        &Notice::overtime_reviewed(
            overtime.id,
            decision == RequestStatus::Approved,
            payload.note.as_deref(),
        ),
    )
    .await;

    info!(overtime_id = overtime.id, decision = %decision, "Overtime reviewed");
    Ok(HttpResponse::Ok().json(view(pool, find_overtime(pool, overtime.id).await?).await))
}
