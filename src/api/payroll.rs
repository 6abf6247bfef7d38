use crate::{
    api::employee::find_employee,
    auth::auth::AuthUser,
    error::{AppError, AppResult, conflict_on_duplicate},
    model::{
        employee::Employee,
        salary_slip::{SALARY_SLIP_COLUMNS, SalarySlip, SalarySlipStatus},
    },
    service::{
        notify::{self, Notice},
        payroll::{self, PayAdjustments, SalaryBreakdown},
    },
    utils::{
        pagination::{Page, PageQuery},
        query_filter::{Filter, fetch_all, fetch_page},
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

const INSERT_COLUMNS: &str = "employee_id, year, month, total_days_in_month, working_days, \
    weekly_offs, total_effective_working_hours, total_overtime_hours, raw_present_days, \
    present_days, absent_days, proration_factor, basic_pay, hra_amount, medical_allowance, \
    conveyance_allowance, uniform_and_safety_allowance, bonus, food_allowance, special_allowance, \
    overtime_pay, total_special_allowance, other_incentive, epf_employer_earnings, total_earnings, \
    epf_employee_deduction, epf_employer_deduction, esic_deduction, professional_tax, tds, \
    advance_salary_recovery, loan_recovery, fuel_advance_recovery, other_deductions, \
    total_statutory_deductions, total_other_deductions, total_deductions, net_salary, daily_rate, \
    hourly_rate, overtime_rate, status, generated_by, generated_at, notes";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SlipRequest {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 3)]
    pub month: u32,
    #[serde(flatten)]
    pub adjustments: PayAdjustments,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkSlipRequest {
    pub requests: Vec<SlipRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkSlipResult {
    pub employee_id: u64,
    pub success: bool,
    pub slip_id: Option<u64>,
    pub net_salary: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalaryCalculation {
    pub employee_id: u64,
    pub employee_name: String,
    pub year: i32,
    pub month: u32,
    pub period: String,
    pub breakdown: SalaryBreakdown,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SlipStatusUpdate {
    #[schema(example = "PAID")]
    pub status: SalarySlipStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PeriodQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SlipListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub status: Option<SalarySlipStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SlipView {
    #[serde(flatten)]
    pub slip: SalarySlip,
    pub employee_name: String,
    pub employee_code: String,
    #[schema(example = "March 2026")]
    pub period: String,
}

/// Employees only see slips that payroll has released.
pub fn released(status: &str) -> bool {
    matches!(
        status.parse::<SalarySlipStatus>(),
        Ok(SalarySlipStatus::Finalized | SalarySlipStatus::Paid)
    )
}

fn can_view_slip(auth: &AuthUser, slip: &SalarySlip) -> bool {
    auth.is_manager() || (auth.employee_id == Some(slip.employee_id) && released(&slip.status))
}

async fn view(pool: &MySqlPool, slip: SalarySlip) -> SlipView {
    let (employee_name, employee_code) = match find_employee(pool, slip.employee_id).await {
        Ok(e) => (e.full_name(), e.employee_code),
        Err(_) => (String::new(), String::new()),
    };
    SlipView {
        period: payroll::period_label(slip.year, slip.month as u32),
        employee_name,
        employee_code,
        slip,
    }
}

async fn views(pool: &MySqlPool, rows: Vec<SalarySlip>) -> Vec<SlipView> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(view(pool, row).await);
    }
    out
}

async fn find_slip(pool: &MySqlPool, slip_id: u64) -> AppResult<SalarySlip> {
    let sql = format!("SELECT {SALARY_SLIP_COLUMNS} FROM salary_slips WHERE id = ? AND deleted = 0");
    sqlx::query_as::<_, SalarySlip>(&sql)
        .bind(slip_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Salary slip not found"))
}

/// `(working_hours, overtime_hours)` for every attendance row of the month.
async fn month_hours(
    pool: &MySqlPool,
    employee_id: u64,
    year: i32,
    month: u32,
) -> AppResult<Vec<(f64, f64)>> {
    let (first, last) = payroll::month_bounds(year, month)?;
    let rows = sqlx::query_as::<_, (f64, f64)>(
        r#"
        SELECT COALESCE(working_hours, 0), COALESCE(overtime_hours, 0)
        FROM attendance
        WHERE employee_id = ? AND date BETWEEN ? AND ?
        "#,
    )
    .bind(employee_id)
    .bind(first)
    .bind(last)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn calculate_for(
    pool: &MySqlPool,
    req: &SlipRequest,
) -> AppResult<(Employee, SalaryBreakdown)> {
    payroll::validate_period(req.year, req.month)?;
    let employee = find_employee(pool, req.employee_id).await?;
    let days = month_hours(pool, employee.id, req.year, req.month).await?;
    let breakdown = payroll::calculate(&employee, req.year, req.month, &days, &req.adjustments)?;
    Ok((employee, breakdown))
}

async fn insert_slip(
    pool: &MySqlPool,
    req: &SlipRequest,
    b: &SalaryBreakdown,
    generated_by: u64,
) -> AppResult<u64> {
    let placeholders = vec!["?"; INSERT_COLUMNS.split(',').count()].join(", ");
    let sql = format!("INSERT INTO salary_slips ({INSERT_COLUMNS}) VALUES ({placeholders})");
    let (e, d) = (&b.earnings, &b.deductions);
    let id = sqlx::query(&sql)
        .bind(req.employee_id)
        .bind(req.year)
        .bind(req.month)
        .bind(b.calendar.total_days_in_month)
        .bind(b.calendar.working_days)
        .bind(b.calendar.weekly_offs)
        .bind(b.attendance.total_effective_working_hours)
        .bind(b.attendance.total_overtime_hours)
        .bind(b.attendance.raw_present_days)
        .bind(b.attendance.present_days)
        .bind(b.attendance.absent_days)
        .bind(b.proration_factor)
        .bind(e.basic_pay)
        .bind(e.hra_amount)
        .bind(e.medical_allowance)
        .bind(e.conveyance_allowance)
        .bind(e.uniform_and_safety_allowance)
        .bind(e.bonus)
        .bind(e.food_allowance)
        .bind(e.special_allowance)
        .bind(e.overtime_pay)
        .bind(e.total_special_allowance)
        .bind(e.other_incentive)
        .bind(e.epf_employer_earnings)
        .bind(e.total_earnings)
        .bind(d.epf_employee_deduction)
        .bind(d.epf_employer_deduction)
        .bind(d.esic_deduction)
        .bind(d.professional_tax)
        .bind(d.tds)
        .bind(d.advance_salary_recovery)
        .bind(d.loan_recovery)
        .bind(d.fuel_advance_recovery)
        .bind(d.other_deductions)
        .bind(d.total_statutory_deductions)
        .bind(d.total_other_deductions)
        .bind(d.total_deductions)
        .bind(b.net_salary)
        .bind(b.daily_rate)
        .bind(b.hourly_rate)
        .bind(b.overtime_rate)
        .bind(SalarySlipStatus::Draft.as_ref())
        .bind(generated_by)
        .bind(Local::now().naive_local())
        .bind(&req.notes)
        .execute(pool)
        .await?
        .last_insert_id();
    Ok(id)
}

async fn generate_one(pool: &MySqlPool, req: &SlipRequest, generated_by: u64) -> AppResult<SalarySlip> {
    let (_, breakdown) = calculate_for(pool, req).await?;
    let slip_id = insert_slip(pool, req, &breakdown, generated_by).await?;
    info!(
        slip_id,
        employee_id = req.employee_id,
        year = req.year,
        month = req.month,
        net_salary = breakdown.net_salary,
        "Salary slip generated"
    );
    find_slip(pool, slip_id).await
}

fn finalized_elsewhere(slip: &SalarySlip) -> String {
    format!(
        "A finalized salary slip already exists for {}",
        payroll::period_label(slip.year, slip.month as u32)
    )
}

/// Decides a finalize against every live slip of the same employee and month
/// as `(id, status)`. `Ok(true)` when `slip` itself is already the finalized one.
fn finalize_check(month_slips: &[(u64, String)], slip: &SalarySlip) -> AppResult<bool> {
    let finalized =
        |status: &str| status.parse::<SalarySlipStatus>().ok() == Some(SalarySlipStatus::Finalized);
    if month_slips
        .iter()
        .any(|(id, status)| *id != slip.id && finalized(status))
    {
        return Err(AppError::conflict(finalized_elsewhere(slip)));
    }
    Ok(month_slips
        .iter()
        .any(|(id, status)| *id == slip.id && finalized(status)))
}

/// Writes the new status. Finalizing locks the month's slips first so two
/// drafts cannot both end up finalized; returns whether the slip became
/// FINALIZED with this call.
async fn set_status(pool: &MySqlPool, slip: &SalarySlip, status: SalarySlipStatus) -> AppResult<bool> {
    let mut tx = pool.begin().await?;

    let mut newly_finalized = false;
    if status == SalarySlipStatus::Finalized {
        let month_slips = sqlx::query_as::<_, (u64, String)>(
            r#"
            SELECT id, status FROM salary_slips
            WHERE employee_id = ? AND year = ? AND month = ? AND deleted = 0
            FOR UPDATE
            "#,
        )
        .bind(slip.employee_id)
        .bind(slip.year)
        .bind(slip.month)
        .fetch_all(&mut *tx)
        .await?;
        newly_finalized = !finalize_check(&month_slips, slip)?;
    }

    let updated = sqlx::query("UPDATE salary_slips SET status = ? WHERE id = ? AND deleted = 0")
        .bind(status.as_ref())
        .bind(slip.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_duplicate(e, || finalized_elsewhere(slip)))?;
    if updated.rows_affected() == 0 {
        return Err(AppError::not_found("Salary slip not found"));
    }

    tx.commit().await?;
    Ok(newly_finalized)
}

async fn notify_finalized(pool: &MySqlPool, slip: &SalarySlip) {
    let period = payroll::period_label(slip.year, slip.month as u32);
    notify::notify_employee(
        pool,
        slip.employee_id,
        &Notice::salary_slip_finalized(slip.id, &period),
    )
    .await;
}

#[utoipa::path(
    post,
    path = "/api/salary-slips/calculate",
    request_body = SlipRequest,
    responses(
        (status = 200, description = "Salary calculation without saving", body = SalaryCalculation),
        (status = 400, description = "Invalid period or salary structure"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn calculate_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SlipRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let (employee, breakdown) = calculate_for(pool.get_ref(), &payload).await?;
    Ok(HttpResponse::Ok().json(SalaryCalculation {
        employee_id: employee.id,
        employee_name: employee.full_name(),
        year: payload.year,
        month: payload.month,
        period: payroll::period_label(payload.year, payload.month),
        breakdown,
    }))
}

#[utoipa::path(
    post,
    path = "/api/salary-slips",
    request_body = SlipRequest,
    responses(
        (status = 201, description = "Draft salary slip generated", body = SlipView),
        (status = 400, description = "Invalid period or salary structure"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
#[instrument(skip(auth, pool, payload), fields(employee_id = payload.employee_id))]
pub async fn generate_slip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SlipRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let slip = generate_one(pool, &payload, auth.user_id).await?;
    Ok(HttpResponse::Created().json(view(pool, slip).await))
}

#[utoipa::path(
    post,
    path = "/api/salary-slips/bulk",
    request_body = BulkSlipRequest,
    responses((status = 200, description = "Per-employee generation results", body = [BulkSlipResult])),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate_bulk(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<BulkSlipRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let mut results = Vec::with_capacity(payload.requests.len());
    for req in &payload.requests {
        let result = match generate_one(pool, req, auth.user_id).await {
            Ok(slip) => BulkSlipResult {
                employee_id: req.employee_id,
                success: true,
                slip_id: Some(slip.id),
                net_salary: Some(slip.net_salary),
                error: None,
            },
            Err(e) => {
                warn!(employee_id = req.employee_id, error = %e, "Salary slip generation failed");
                BulkSlipResult {
                    employee_id: req.employee_id,
                    success: false,
                    slip_id: None,
                    net_salary: None,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(result);
    }
    let generated = results.iter().filter(|r| r.success).count();
    info!(generated, requested = results.len(), "Bulk salary slip generation finished");
    Ok(HttpResponse::Ok().json(results))
}

#[utoipa::path(
    put,
    path = "/api/salary-slips/{slip_id}/finalize",
    params(("slip_id" = u64, Path, description = "Salary slip ID")),
    responses(
        (status = 200, description = "Salary slip finalized", body = SlipView),
        (status = 400, description = "Already finalized"),
        (status = 409, description = "Another slip for the month is finalized")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn finalize_slip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let slip = find_slip(pool, path.into_inner()).await?;
    let already = || AppError::bad_request("Salary slip is already finalized");
    if slip.status.parse::<SalarySlipStatus>().ok() == Some(SalarySlipStatus::Finalized) {
        return Err(already().into());
    }
    if !set_status(pool, &slip, SalarySlipStatus::Finalized).await? {
        return Err(already().into());
    }
    notify_finalized(pool, &slip).await;

    info!(slip_id = slip.id, employee_id = slip.employee_id, "Salary slip finalized");
    Ok(HttpResponse::Ok().json(view(pool, find_slip(pool, slip.id).await?).await))
}

#[utoipa::path(
    put,
    path = "/api/salary-slips/{slip_id}/status",
    params(("slip_id" = u64, Path, description = "Salary slip ID")),
    request_body = SlipStatusUpdate,
    responses(
        (status = 200, description = "Status updated", body = SlipView),
        (status = 409, description = "Another slip for the month is finalized")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_slip_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SlipStatusUpdate>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let slip = find_slip(pool, path.into_inner()).await?;
    if set_status(pool, &slip, payload.status).await? {
        notify_finalized(pool, &slip).await;
    }

    info!(slip_id = slip.id, status = %payload.status, "Salary slip status updated");
    Ok(HttpResponse::Ok().json(view(pool, find_slip(pool, slip.id).await?).await))
}

#[utoipa::path(
    delete,
    path = "/api/salary-slips/{slip_id}",
    params(("slip_id" = u64, Path, description = "Salary slip ID")),
    responses(
        (status = 200, description = "Salary slip deleted", body = Object, example = json!({"message": "Salary slip deleted"})),
        (status = 400, description = "Only drafts can be deleted")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn delete_slip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let slip = find_slip(pool.get_ref(), path.into_inner()).await?;
    if slip.status.parse::<SalarySlipStatus>().ok() != Some(SalarySlipStatus::Draft) {
        return Err(AppError::bad_request("Only draft salary slips can be deleted").into());
    }
    let deleted = sqlx::query("UPDATE salary_slips SET deleted = 1 WHERE id = ? AND status = ?")
        .bind(slip.id)
        .bind(SalarySlipStatus::Draft.as_ref())
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::bad_request("Only draft salary slips can be deleted").into());
    }
    info!(slip_id = slip.id, "Salary slip deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Salary slip deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/salary-slips/{slip_id}",
    params(("slip_id" = u64, Path, description = "Salary slip ID")),
    responses(
        (status = 200, description = "Salary slip", body = SlipView),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Salary slip not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_slip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let slip = find_slip(pool, path.into_inner()).await?;
    if !can_view_slip(&auth, &slip) {
        return Err(AppError::forbidden("You are not authorized to view this salary slip").into());
    }
    Ok(HttpResponse::Ok().json(view(pool, slip).await))
}

#[utoipa::path(
    get,
    path = "/api/salary-slips/employee/{employee_id}/period",
    params(("employee_id" = u64, Path, description = "Employee ID"), PeriodQuery),
    responses(
        (status = 200, description = "Finalized slip, or the latest draft", body = SlipView),
        (status = 404, description = "No slip for the period")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn slip_for_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<PeriodQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if !auth.can_view_employee(employee_id) {
        return Err(AppError::forbidden("You are not authorized to view these salary slips").into());
    }
    payroll::validate_period(query.year, query.month)?;
    let pool = pool.get_ref();

    let mut statuses = vec![SalarySlipStatus::Finalized, SalarySlipStatus::Paid];
    if auth.is_manager() {
        statuses.push(SalarySlipStatus::Draft);
    }
    let in_list = statuses
        .iter()
        .map(|s| format!("'{}'", s.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {SALARY_SLIP_COLUMNS} FROM salary_slips \
         WHERE employee_id = ? AND year = ? AND month = ? AND deleted = 0 AND status IN ({in_list}) \
         ORDER BY status = 'FINALIZED' DESC, status = 'PAID' DESC, id DESC LIMIT 1"
    );
    let slip = sqlx::query_as::<_, SalarySlip>(&sql)
        .bind(employee_id)
        .bind(query.year)
        .bind(query.month)
        .fetch_optional(pool)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("No salary slip found for this period"))?;
    Ok(HttpResponse::Ok().json(view(pool, slip).await))
}

#[utoipa::path(
    get,
    path = "/api/salary-slips/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses((status = 200, description = "Salary slips of an employee", body = [SlipView])),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn employee_slips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let employee_id = path.into_inner();
    find_employee(pool, employee_id).await?;
    let slips = fetch_all::<SalarySlip>(
        pool,
        SALARY_SLIP_COLUMNS,
        "salary_slips",
        &Filter::new()
            .and("employee_id = ?", employee_id)
            .raw("deleted = 0"),
        "year DESC, month DESC, id DESC",
    )
    .await?;
    Ok(HttpResponse::Ok().json(views(pool, slips).await))
}

#[utoipa::path(
    get,
    path = "/api/salary-slips/my",
    params(SlipListQuery),
    responses((status = 200, description = "My released salary slips", body = [SlipView])),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn my_slips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SlipListQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let pool = pool.get_ref();
    let status = query.status.filter(|s| released(s.as_ref()));
    let filter = Filter::new()
        .and("employee_id = ?", employee_id)
        .raw("deleted = 0")
        .raw("status IN ('FINALIZED', 'PAID')")
        .and_opt("year = ?", query.year)
        .and_opt("month = ?", query.month.map(u64::from))
        .and_opt("status = ?", status.map(|s| s.to_string()));
    let slips = fetch_all::<SalarySlip>(
        pool,
        SALARY_SLIP_COLUMNS,
        "salary_slips",
        &filter,
        "year DESC, month DESC",
    )
    .await?;
    Ok(HttpResponse::Ok().json(views(pool, slips).await))
}

#[utoipa::path(
    get,
    path = "/api/salary-slips",
    params(SlipListQuery),
    responses((status = 200, description = "Paginated salary slips (data, page, per_page, total)", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_slips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SlipListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let filter = Filter::new()
        .raw("deleted = 0")
        .and_opt("year = ?", query.year)
        .and_opt("month = ?", query.month.map(u64::from))
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
    } = fetch_page::<SalarySlip>(
        pool,
        SALARY_SLIP_COLUMNS,
        "salary_slips",
        &filter,
        "year DESC, month DESC, id DESC",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{role::Role, salary_slip::sample_slip};

    #[test]
    fn only_finalized_and_paid_are_released() {
        assert!(released("FINALIZED"));
        assert!(released("PAID"));
        assert!(!released("DRAFT"));
        assert!(!released("CANCELLED"));
        assert!(!released("bogus"));
    }

    #[test]
    fn insert_covers_every_stored_column() {
        let stored = SALARY_SLIP_COLUMNS.split(',').count();
        // id, deleted, created_at and updated_at are filled by the database
        assert_eq!(INSERT_COLUMNS.split(',').count(), stored - 4);
    }

    #[test]
    fn bulk_items_accept_flattened_adjustments() {
        let body: BulkSlipRequest = serde_json::from_value(json!({
            "requests": [
                {"employee_id": 7, "year": 2026, "month": 3, "tds": 500.0},
                {"employee_id": 8, "year": 2026, "month": 3, "other_incentive": 0.0}
            ]
        }))
        .unwrap();
        assert_eq!(body.requests.len(), 2);
        assert_eq!(body.requests[0].adjustments.tds, 500.0);
        assert_eq!(body.requests[1].adjustments.other_incentive, Some(0.0));
    }

    #[test]
    fn employees_cannot_see_their_drafts() {
        let auth = AuthUser {
            user_id: 3,
            username: "asha".into(),
            role: Role::Employee,
            employee_id: Some(7),
        };
        let mut slip = sample_slip();
        assert!(!can_view_slip(&auth, &slip));
        slip.status = "FINALIZED".into();
        assert!(can_view_slip(&auth, &slip));
        slip.employee_id = 8;
        assert!(!can_view_slip(&auth, &slip));
    }

    #[test]
    fn finalize_is_blocked_by_another_finalized_slip() {
        let slip = sample_slip();
        let month = |rows: &[(u64, &str)]| -> Vec<(u64, String)> {
            rows.iter().map(|(id, s)| (*id, s.to_string())).collect()
        };

        assert!(!finalize_check(&month(&[(1, "DRAFT"), (2, "DRAFT")]), &slip).unwrap());
        assert!(finalize_check(&month(&[(1, "FINALIZED")]), &slip).unwrap());

        let err = finalize_check(&month(&[(1, "DRAFT"), (2, "FINALIZED")]), &slip).unwrap_err();
        assert_eq!(
            actix_web::ResponseError::status_code(&err),
            actix_web::http::StatusCode::CONFLICT
        );
        assert!(err.to_string().starts_with("A finalized salary slip already exists for"));

        // paid or cancelled slips of the month do not count
        assert!(!finalize_check(&month(&[(1, "DRAFT"), (2, "PAID"), (3, "CANCELLED")]), &slip).unwrap());
    }
}
