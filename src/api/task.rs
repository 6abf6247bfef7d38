use crate::{
    api::employee::{employee_name, find_employee},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        employee::{EMPLOYEE_COLUMNS, Employee},
        task::{TASK_COLUMNS, Task, TaskStatus},
    },
    service::{
        notify::{self, Notice},
        review::ensure_review_applied,
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
pub struct TaskRequest {
    #[schema(value_type = String, format = "date", example = "2026-02-10")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-02-12")]
    pub end_date: NaiveDate,
    #[schema(example = "Pune")]
    pub location: String,
    pub description: String,
    #[schema(example = "Train")]
    pub mode_of_travel: String,
    pub site_name: Option<String>,
    pub site_contact_person_name: Option<String>,
    pub site_contact_phone: Option<String>,
    pub employee_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskReview {
    #[schema(example = "APPROVED")]
    pub status: TaskStatus,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TaskListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MyTaskQuery {
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskAssignee {
    pub id: u64,
    pub employee_code: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub assignees: Vec<TaskAssignee>,
}

pub fn validate_task(req: &TaskRequest) -> AppResult<Vec<u64>> {
    if req.end_date < req.start_date {
        return Err(AppError::bad_request("End date cannot be before start date"));
    }
    for (value, field) in [
        (&req.location, "Location"),
        (&req.description, "Description"),
        (&req.mode_of_travel, "Mode of travel"),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::bad_request(format!("{field} is required")));
        }
    }
    let mut ids = req.employee_ids.clone();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Err(AppError::bad_request("At least one employee must be assigned"));
    }
    Ok(ids)
}

/// Reviewers can only move a pending task to approved or rejected.
pub fn task_review_transition(current: &str, decision: TaskStatus) -> AppResult<TaskStatus> {
    if decision == TaskStatus::Pending {
        return Err(AppError::bad_request("Status must be either APPROVED or REJECTED"));
    }
    match current.parse::<TaskStatus>() {
        Ok(TaskStatus::Pending) => Ok(decision),
        _ => Err(AppError::bad_request("Can only review tasks in PENDING status")),
    }
}

async fn ensure_assignable(pool: &MySqlPool, employee_ids: &[u64]) -> AppResult<()> {
    for &id in employee_ids {
        match find_employee(pool, id).await {
            Err(AppError::NotFound(_)) => {
                return Err(AppError::bad_request(format!(
                    "Employee with id {id} not found or deleted"
                )));
            }
            other => {
                other?;
            }
        }
    }
    Ok(())
}

async fn assignee_ids(pool: &MySqlPool, task_id: u64) -> AppResult<Vec<u64>> {
    let ids = sqlx::query_scalar::<_, u64>(
        "SELECT employee_id FROM task_assignments WHERE task_id = ? ORDER BY employee_id",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

async fn view(pool: &MySqlPool, task: Task) -> AppResult<TaskView> {
    let sql = format!(
        "SELECT {} FROM employees e JOIN task_assignments ta ON ta.employee_id = e.id \
         WHERE ta.task_id = ? ORDER BY e.first_name",
        qualify(EMPLOYEE_COLUMNS, "e")
    );
    let assignees = sqlx::query_as::<_, Employee>(&sql)
        .bind(task.id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|e| TaskAssignee {
            id: e.id,
            name: e.full_name(),
            employee_code: e.employee_code,
        })
        .collect();
    Ok(TaskView { task, assignees })
}

async fn views(pool: &MySqlPool, tasks: Vec<Task>) -> AppResult<Vec<TaskView>> {
    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        out.push(view(pool, task).await?);
    }
    Ok(out)
}

async fn find_task(pool: &MySqlPool, task_id: u64) -> AppResult<Task> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND deleted = 0");
    sqlx::query_as::<_, Task>(&sql)
        .bind(task_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))
}

fn ensure_task_pending(rows_affected: u64) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(not_pending());
    }
    Ok(())
}

fn not_pending() -> AppError {
    AppError::bad_request("Cannot modify a task that is not in PENDING status")
}

/// HR/Admin who assigned the task, while it is still pending.
async fn editable_task(pool: &MySqlPool, auth: &AuthUser, task_id: u64) -> AppResult<Task> {
    auth.require_hr_or_admin()?;
    let task = find_task(pool, task_id).await?;
    if task.status.parse::<TaskStatus>().ok() != Some(TaskStatus::Pending) {
        return Err(not_pending());
    }
    if task.assigned_by != auth.user_id {
        return Err(AppError::forbidden("You can only modify tasks assigned by you"));
    }
    Ok(task)
}

async fn insert_assignments(pool: &MySqlPool, task_id: u64, employee_ids: &[u64]) -> AppResult<()> {
    for &employee_id in employee_ids {
        sqlx::query("INSERT IGNORE INTO task_assignments (task_id, employee_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(employee_id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

async fn notify_assignees(pool: &MySqlPool, task_id: u64, location: &str, employee_ids: &[u64]) {
    let users = notify::user_ids_for_employees(pool, employee_ids)
        .await
        .unwrap_or_default();
    notify::fan_out(pool, &users, &Notice::task_assigned(task_id, location)).await;
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = TaskRequest,
    responses(
        (status = 201, description = "Task assigned", body = TaskView),
        (status = 400, description = "Invalid task")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn assign_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<TaskRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let employee_ids = validate_task(&payload)?;
    ensure_assignable(pool, &employee_ids).await?;

    let task_id = sqlx::query(
        r#"
        INSERT INTO tasks
            (start_date, end_date, location, description, mode_of_travel, site_name,
             site_contact_person_name, site_contact_phone, status, assigned_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.location.trim())
    .bind(payload.description.trim())
    .bind(payload.mode_of_travel.trim())
    .bind(&payload.site_name)
    .bind(&payload.site_contact_person_name)
    .bind(&payload.site_contact_phone)
    .bind(TaskStatus::Pending.as_ref())
    .bind(auth.user_id)
    .execute(pool)
    .await
    .map_err(AppError::from)?
    .last_insert_id();

    insert_assignments(pool, task_id, &employee_ids).await?;
    notify_assignees(pool, task_id, payload.location.trim(), &employee_ids).await;

    info!(task_id, assignees = employee_ids.len(), "Task assigned");
    Ok(HttpResponse::Created().json(view(pool, find_task(pool, task_id).await?).await?))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    request_body = TaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskView),
        (status = 400, description = "Not pending or invalid"),
        (status = 403, description = "Not the assigner")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<TaskRequest>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let task = editable_task(pool, &auth, path.into_inner()).await?;
    let employee_ids = validate_task(&payload)?;
    ensure_assignable(pool, &employee_ids).await?;

    let updated = sqlx::query(
        r#"
        UPDATE tasks SET start_date = ?, end_date = ?, location = ?, description = ?,
            mode_of_travel = ?, site_name = ?, site_contact_person_name = ?, site_contact_phone = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.location.trim())
    .bind(payload.description.trim())
    .bind(payload.mode_of_travel.trim())
    .bind(&payload.site_name)
    .bind(&payload.site_contact_person_name)
    .bind(&payload.site_contact_phone)
    .bind(task.id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    ensure_task_pending(updated.rows_affected())?;

    let previous = assignee_ids(pool, task.id).await?;
    let removed: Vec<u64> = previous
        .iter()
        .copied()
        .filter(|id| !employee_ids.contains(id))
        .collect();
    let added: Vec<u64> = employee_ids
        .iter()
        .copied()
        .filter(|id| !previous.contains(id))
        .collect();

    for employee_id in &removed {
        sqlx::query("DELETE FROM task_assignments WHERE task_id = ? AND employee_id = ?")
            .bind(task.id)
            .bind(employee_id)
            .execute(pool)
            .await
            .map_err(AppError::from)?;
    }
    insert_assignments(pool, task.id, &added).await?;
    if !added.is_empty() {
        notify_assignees(pool, task.id, payload.location.trim(), &added).await;
    }

    info!(task_id = task.id, added = added.len(), removed = removed.len(), "Task updated");
    Ok(HttpResponse::Ok().json(view(pool, find_task(pool, task.id).await?).await?))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task deleted", body = Object, example = json!({"message": "Task deleted"})),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not the assigner")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn delete_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let task = editable_task(pool.get_ref(), &auth, path.into_inner()).await?;
    let deleted = sqlx::query("UPDATE tasks SET deleted = 1 WHERE id = ? AND status = 'PENDING'")
        .bind(task.id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    ensure_task_pending(deleted.rows_affected())?;
    info!(task_id = task.id, "Task deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Task deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/tasks/my",
    params(MyTaskQuery),
    responses((status = 200, description = "Tasks assigned to me", body = [TaskView])),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn my_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MyTaskQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    let tasks = fetch_all::<Task>(
        pool,
        &qualify(TASK_COLUMNS, "t"),
        "tasks t JOIN task_assignments ta ON ta.task_id = t.id",
        &Filter::new()
            .and("ta.employee_id = ?", employee_id)
            .raw("t.deleted = 0")
            .and_opt("t.status = ?", query.status.map(|s| s.to_string())),
        "t.start_date DESC",
    )
    .await?;
    Ok(HttpResponse::Ok().json(views(pool, tasks).await?))
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    params(TaskListQuery),
    responses((status = 200, description = "Paginated tasks (data, page, per_page, total)", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TaskListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let filter = Filter::new()
        .raw("deleted = 0")
        .and_opt("status = ?", query.status.map(|s| s.to_string()));
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let Page {
        data,
        page,
        per_page,
        total,
    } = fetch_page::<Task>(pool, TASK_COLUMNS, "tasks", &filter, "created_at DESC", &page).await?;
    Ok(HttpResponse::Ok().json(Page {
        data: views(pool, data).await?,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = TaskView),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn get_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let task = find_task(pool, path.into_inner()).await?;
    let is_assignee = match auth.employee_id {
        Some(me) => assignee_ids(pool, task.id).await?.contains(&me),
        None => false,
    };
    if !auth.is_manager() && task.assigned_by != auth.user_id && !is_assignee {
        return Err(AppError::forbidden("You are not authorized to view this task").into());
    }
    Ok(HttpResponse::Ok().json(view(pool, task).await?))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}/review",
    params(("task_id" = u64, Path, description = "Task ID")),
    request_body = TaskReview,
    responses(
        (status = 200, description = "Task reviewed", body = TaskView),
        (status = 400, description = "Not pending or invalid decision"),
        (status = 403, description = "Not an assignee")
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn review_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<TaskReview>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    let task = find_task(pool, path.into_inner()).await?;
    if !assignee_ids(pool, task.id).await?.contains(&employee_id) {
        return Err(AppError::forbidden("You are not authorized to review this task").into());
    }
    let decision = task_review_transition(&task.status, payload.status)?;

    let reviewed = sqlx::query(
        r#"
        UPDATE tasks SET status = ?, reviewed_by = ?, reviewed_at = ?, review_note = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(decision.as_ref())
    .bind(employee_id)
    .bind(Local::now().naive_local())
    .bind(&payload.note)
    .bind(task.id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    ensure_review_applied(reviewed.rows_affected())?;

    let name = employee_name(pool, employee_id).await;
    notify::notify_managers(
        pool,
        &Notice::task_reviewed(task.id, &task.location, &name, decision.as_ref()),
    )
    .await;

    info!(task_id = task.id, decision = %decision, employee_id, "Task reviewed");
    Ok(HttpResponse::Ok().json(view(pool, find_task(pool, task.id).await?).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(ids: Vec<u64>) -> TaskRequest {
        TaskRequest {
            start_date: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 12).unwrap(),
            location: "Pune".into(),
            description: "Soil testing".into(),
            mode_of_travel: "Train".into(),
            site_name: None,
            site_contact_person_name: None,
            site_contact_phone: None,
            employee_ids: ids,
        }
    }

    #[test]
    fn assignees_are_required_and_deduplicated() {
        assert_eq!(validate_task(&request(vec![5, 3, 5])).unwrap(), vec![3, 5]);
        assert!(validate_task(&request(vec![])).is_err());
    }

    #[test]
    fn task_fields_are_checked() {
        let mut req = request(vec![1]);
        req.end_date = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        assert!(validate_task(&req).is_err());

        let mut req = request(vec![1]);
        req.mode_of_travel = " ".into();
        let err = validate_task(&req).unwrap_err();
        assert_eq!(err.to_string(), "Mode of travel is required");
    }

    #[test]
    fn only_pending_tasks_are_reviewed() {
        assert_eq!(
            task_review_transition("PENDING", TaskStatus::Approved).unwrap(),
            TaskStatus::Approved
        );
        assert!(task_review_transition("PENDING", TaskStatus::Pending).is_err());
        assert!(task_review_transition("REJECTED", TaskStatus::Approved).is_err());
    }

    #[test]
    fn edit_that_matched_no_pending_row_fails() {
        assert!(ensure_task_pending(1).is_ok());
        let err = ensure_task_pending(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot modify a task that is not in PENDING status"
        );
    }
}
