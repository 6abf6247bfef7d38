use crate::{
    api::employee::employee_name,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        expense::{EXPENSE_COLUMNS, Expense, ExpenseCategory},
        review::{RequestStatus, ReviewRequest},
    },
    service::{
        notify::{self, Notice},
        review::{
            ensure_edit_applied, ensure_pending, ensure_review_applied, review_transition,
            validate_expense,
        },
    },
    utils::{
        pagination::{Page, PageQuery},
        query_filter::{Filter, fetch_all, fetch_page},
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
pub struct ExpenseApplication {
    #[schema(value_type = String, format = "date", example = "2026-02-03")]
    pub expense_date: NaiveDate,
    pub category: ExpenseCategory,
    #[schema(example = 1250.0)]
    pub amount: f64,
    #[schema(example = "Cab to Thane site")]
    pub description: String,
    /// Receipt URLs; uploads are handled elsewhere
    #[serde(default)]
    pub receipt_urls: Vec<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExpenseListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<RequestStatus>,
    pub category: Option<ExpenseCategory>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpenseView {
    #[serde(flatten)]
    pub expense: Expense,
    pub employee_name: String,
    pub receipts: Vec<String>,
}

/// Blank URLs dropped; `None` when nothing remains.
pub fn encode_receipts(urls: &[String]) -> Option<String> {
    let urls: Vec<&str> = urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .collect();
    if urls.is_empty() {
        None
    } else {
        serde_json::to_string(&urls).ok()
    }
}

async fn view(pool: &MySqlPool, expense: Expense) -> ExpenseView {
    ExpenseView {
        employee_name: employee_name(pool, expense.employee_id).await,
        receipts: expense.receipts(),
        expense,
    }
}

async fn views(pool: &MySqlPool, rows: Vec<Expense>) -> Vec<ExpenseView> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(view(pool, row).await);
    }
    out
}

async fn find_expense(pool: &MySqlPool, expense_id: u64) -> AppResult<Expense> {
    let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ? AND deleted = 0");
    sqlx::query_as::<_, Expense>(&sql)
        .bind(expense_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Expense not found"))
}

async fn owned_pending(pool: &MySqlPool, auth: &AuthUser, expense_id: u64) -> AppResult<Expense> {
    let employee_id = auth.require_employee()?;
    let expense = find_expense(pool, expense_id).await?;
    if expense.employee_id != employee_id {
        return Err(AppError::forbidden("You can only modify your own expenses"));
    }
    ensure_pending(&expense.status, "expense")?;
    Ok(expense)
}

#[utoipa::path(
    post,
    path = "/api/expenses",
    request_body = ExpenseApplication,
    responses(
        (status = 201, description = "Expense submitted", body = ExpenseView),
        (status = 400, description = "Invalid expense")
    ),
    security(("bearer_auth" = [])),
    tag = "Expense"
)]
pub async fn apply_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ExpenseApplication>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    validate_expense(
        payload.expense_date,
        payload.amount,
        &payload.description,
        Local::now().date_naive(),
    )?;

    let expense_id = sqlx::query(
        r#"
        INSERT INTO expenses
            (employee_id, expense_date, category, amount, description, receipt_urls, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.expense_date)
    .bind(payload.category.as_ref())
    .bind(payload.amount)
    .bind(payload.description.trim())
    .bind(encode_receipts(&payload.receipt_urls))
    .bind(RequestStatus::Pending.as_ref())
    .execute(pool)
    .await
    .map_err(AppError::from)?
    .last_insert_id();

    let created = view(pool, find_expense(pool, expense_id).await?).await;
    notify::notify_managers(
        pool,
        &Notice::expense_requested(expense_id, &created.employee_name, payload.amount),
    )
    .await;
    info!(expense_id, employee_id, amount = payload.amount, "Expense submitted");
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    put,
    path = "/api/expenses/{expense_id}",
    params(("expense_id" = u64, Path, description = "Expense ID")),
    request_body = ExpenseApplication,
    responses(
        (status = 200, description = "Expense updated", body = ExpenseView),
        (status = 400, description = "Not pending or invalid"),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer_auth" = [])),
    tag = "Expense"
)]
pub async fn update_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ExpenseApplication>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let expense = owned_pending(pool, &auth, path.into_inner()).await?;
    validate_expense(
        payload.expense_date,
        payload.amount,
        &payload.description,
        Local::now().date_naive(),
    )?;

    let updated = sqlx::query(
        r#"
        UPDATE expenses SET expense_date = ?, category = ?, amount = ?, description = ?,
            receipt_urls = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(payload.expense_date)
    .bind(payload.category.as_ref())
    .bind(payload.amount)
    .bind(payload.description.trim())
    .bind(encode_receipts(&payload.receipt_urls))
    .bind(expense.id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    ensure_edit_applied(updated.rows_affected(), "expense")?;

    Ok(HttpResponse::Ok().json(view(pool, find_expense(pool, expense.id).await?).await))
}

#[utoipa::path(
    delete,
    path = "/api/expenses/{expense_id}",
    params(("expense_id" = u64, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense withdrawn", body = Object, example = json!({"message": "Expense deleted"})),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not the owner")
    ),
    security(("bearer_auth" = [])),
    tag = "Expense"
)]
pub async fn delete_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let expense = owned_pending(pool.get_ref(), &auth, path.into_inner()).await?;
    let deleted = sqlx::query("UPDATE expenses SET deleted = 1 WHERE id = ? AND status = 'PENDING'")
        .bind(expense.id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    ensure_edit_applied(deleted.rows_affected(), "expense")?;
    info!(expense_id = expense.id, "Expense deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Expense deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/expenses/my",
    responses((status = 200, description = "My expenses", body = [ExpenseView])),
    security(("bearer_auth" = [])),
    tag = "Expense"
)]
pub async fn my_expenses(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    let rows = fetch_all::<Expense>(
        pool,
        EXPENSE_COLUMNS,
        "expenses",
        &Filter::new()
            .and("employee_id = ?", employee_id)
            .raw("deleted = 0"),
        "expense_date DESC, created_at DESC",
    )
    .await?;
    Ok(HttpResponse::Ok().json(views(pool, rows).await))
}

#[utoipa::path(
    get,
    path = "/api/expenses",
    params(ExpenseListQuery),
    responses((status = 200, description = "Paginated expenses (data, page, per_page, total)", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Expense"
)]
pub async fn list_expenses(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ExpenseListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let filter = Filter::new()
        .raw("deleted = 0")
        .and_opt("status = ?", query.status.map(|s| s.to_string()))
        .and_opt("category = ?", query.category.map(|c| c.to_string()));
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let Page {
        data,
        page,
        per_page,
        total,
    } = fetch_page::<Expense>(
        pool,
        EXPENSE_COLUMNS,
        "expenses",
        &filter,
        "created_at DESC",
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
    path = "/api/expenses/{expense_id}",
    params(("expense_id" = u64, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense", body = ExpenseView),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Expense not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Expense"
)]
pub async fn get_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let expense = find_expense(pool, path.into_inner()).await?;
    if !auth.can_view_employee(expense.employee_id) {
        return Err(AppError::forbidden("Not allowed to view this expense").into());
    }
    Ok(HttpResponse::Ok().json(view(pool, expense).await))
}

#[utoipa::path(
    put,
    path = "/api/expenses/{expense_id}/review",
    params(("expense_id" = u64, Path, description = "Expense ID")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Expense reviewed", body = ExpenseView),
        (status = 400, description = "Not pending or invalid decision"),
        (status = 404, description = "Expense not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Expense"
)]
pub async fn review_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReviewRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let expense = find_expense(pool, path.into_inner()).await?;
    let decision = review_transition(&expense.status, payload.status)?;

    let reviewed = sqlx::query(
        r#"
        UPDATE expenses SET status = ?, reviewed_by = ?, reviewed_at = ?, review_note = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(decision.as_ref())
    .bind(auth.user_id)
    .bind(Local::now().naive_local())
    .bind(&payload.note)
    .bind(expense.id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;
    ensure_review_applied(reviewed.rows_affected())?;

    notify::notify_employee(
        pool,
        expense.employee_id,
        &Notice::expense_reviewed(
            expense.id,
            decision == RequestStatus::Approved,
            payload.note.as_deref(),
        ),
    )
    .await;

    info!(expense_id = expense.id, decision = %decision, "Expense reviewed");
    Ok(HttpResponse::Ok().json(view(pool, find_expense(pool, expense.id).await?).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipts_drop_blank_urls() {
        let urls = vec![
            " https://files.civildesk.in/r1.jpg ".to_string(),
            "".to_string(),
            "https://files.civildesk.in/r2.jpg".to_string(),
        ];
        assert_eq!(
            encode_receipts(&urls).as_deref(),
            Some(r#"["https://files.civildesk.in/r1.jpg","https://files.civildesk.in/r2.jpg"]"#)
        );
        assert_eq!(encode_receipts(&["  ".to_string()]), None);
    }
}
