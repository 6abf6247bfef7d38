use crate::{
    auth::{auth::AuthUser, handlers::create_user},
    error::{AppError, AppResult, is_duplicate_key},
    model::{
        employee::{
            AttendanceMethod, EMPLOYEE_COLUMNS, Employee, EmploymentStatus, EmploymentType,
        },
        role::Role,
    },
    models::CredentialsReq,
    utils::{
        db_utils::{Column, ColumnKind, build_update_sql, canonical, execute_update},
        identity::{self, IdentityKind},
        pagination::PageQuery,
        query_filter::{Filter, fetch_page},
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const CODE_PREFIX: &str = "EMP-";

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    /// Generated as EMP-0001, EMP-0002, ... when omitted.
    #[schema(example = "EMP-0042")]
    pub employee_code: Option<String>,
    #[schema(example = "Ravi")]
    pub first_name: String,
    #[schema(example = "Kumar")]
    pub last_name: String,
    #[schema(example = "ravi.kumar@civildesk.in", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub joining_date: Option<NaiveDate>,
    pub employment_type: Option<EmploymentType>,
    pub attendance_method: Option<AttendanceMethod>,
    pub uan_number: Option<String>,
    pub esic_number: Option<String>,
    pub basic_salary: Option<f64>,
    pub house_rent_allowance: Option<f64>,
    pub conveyance: Option<f64>,
    pub uniform_and_safety: Option<f64>,
    pub bonus: Option<f64>,
    pub food_allowance: Option<f64>,
    pub other_allowance: Option<f64>,
    pub overtime_rate: Option<f64>,
    pub epf_employee: Option<f64>,
    pub epf_employer: Option<f64>,
    pub esic: Option<f64>,
    pub professional_tax: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department: Option<String>,
    pub designation: Option<String>,
    /// ACTIVE, INACTIVE, TERMINATED or ON_LEAVE
    pub status: Option<String>,
    /// Matches name, email or employee code
    pub search: Option<String>,
}

const UPDATABLE: &[Column] = &[
    Column::required("first_name", ColumnKind::Text),
    Column::required("last_name", ColumnKind::Text),
    Column::required("email", ColumnKind::Text),
    Column::optional("phone", ColumnKind::Text),
    Column::optional("department", ColumnKind::Text),
    Column::optional("designation", ColumnKind::Text),
    Column::optional("joining_date", ColumnKind::Date),
    Column::required("employment_type", ColumnKind::Enum(canonical::<EmploymentType>)),
    Column::required("employment_status", ColumnKind::Enum(canonical::<EmploymentStatus>)),
    Column::required("attendance_method", ColumnKind::Enum(canonical::<AttendanceMethod>)),
    Column::optional("uan_number", ColumnKind::Text),
    Column::optional("esic_number", ColumnKind::Text),
    Column::required("basic_salary", ColumnKind::Float),
    Column::required("house_rent_allowance", ColumnKind::Float),
    Column::required("conveyance", ColumnKind::Float),
    Column::required("uniform_and_safety", ColumnKind::Float),
    Column::required("bonus", ColumnKind::Float),
    Column::required("food_allowance", ColumnKind::Float),
    Column::required("other_allowance", ColumnKind::Float),
    Column::required("overtime_rate", ColumnKind::Float),
    Column::required("epf_employee", ColumnKind::Float),
    Column::required("epf_employer", ColumnKind::Float),
    Column::required("esic", ColumnKind::Float),
    Column::required("professional_tax", ColumnKind::Float),
];

/// Next code after the highest `EMP-NNNN` in use.
pub fn next_employee_code<'a>(existing: impl IntoIterator<Item = &'a str>) -> String {
    let max = existing
        .into_iter()
        .filter_map(|code| code.strip_prefix(CODE_PREFIX))
        .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|digits| digits.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{CODE_PREFIX}{:04}", max + 1)
}

pub async fn find_employee(pool: &MySqlPool, employee_id: u64) -> AppResult<Employee> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? AND deleted = 0");
    sqlx::query_as::<_, Employee>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))
}

pub async fn employee_name(pool: &MySqlPool, employee_id: u64) -> String {
    match find_employee(pool, employee_id).await {
        Ok(e) => e.full_name(),
        Err(_) => format!("Employee #{employee_id}"),
    }
}

async fn generate_code(pool: &MySqlPool) -> AppResult<String> {
    let codes = sqlx::query_scalar::<_, String>(
        "SELECT employee_code FROM employees WHERE employee_code LIKE 'EMP-%'",
    )
    .fetch_all(pool)
    .await?;
    Ok(next_employee_code(codes.iter().map(String::as_str)))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Code or email already used", body = Object, example = json!({
            "message": "Employee code already exists"
        }))
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let p = payload.into_inner();

    if p.first_name.trim().is_empty() || p.email.trim().is_empty() {
        return Err(AppError::bad_request("First name and email are required").into());
    }

    let code = match p.employee_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            if !identity::is_available(pool.get_ref(), IdentityKind::EmployeeCode, code).await {
                return Err(AppError::conflict("Employee code already exists").into());
            }
            code.to_string()
        }
        None => generate_code(pool.get_ref()).await?,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_code, first_name, last_name, email, phone, department, designation,
             joining_date, employment_type, attendance_method, uan_number, esic_number,
             basic_salary, house_rent_allowance, conveyance, uniform_and_safety, bonus,
             food_allowance, other_allowance, overtime_rate, epf_employee, epf_employer, esic,
             professional_tax)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&code)
    .bind(p.first_name.trim())
    .bind(p.last_name.trim())
    .bind(p.email.trim())
    .bind(p.phone)
    .bind(p.department)
    .bind(p.designation)
    .bind(p.joining_date)
    .bind(p.employment_type.unwrap_or(EmploymentType::FullTime).as_ref())
    .bind(p.attendance_method.unwrap_or(AttendanceMethod::GpsBased).as_ref())
    .bind(p.uan_number)
    .bind(p.esic_number)
    .bind(p.basic_salary.unwrap_or(0.0))
    .bind(p.house_rent_allowance.unwrap_or(0.0))
    .bind(p.conveyance.unwrap_or(0.0))
    .bind(p.uniform_and_safety.unwrap_or(0.0))
    .bind(p.bonus.unwrap_or(0.0))
    .bind(p.food_allowance.unwrap_or(0.0))
    .bind(p.other_allowance.unwrap_or(0.0))
    .bind(p.overtime_rate.unwrap_or(1.0))
    .bind(p.epf_employee.unwrap_or(12.0))
    .bind(p.epf_employer.unwrap_or(13.0))
    .bind(p.esic.unwrap_or(0.75))
    .bind(p.professional_tax.unwrap_or(0.0))
    .execute(pool.get_ref())
    .await;

    let id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::conflict("Employee code or email already exists").into());
        }
        Err(e) => return Err(AppError::from(e).into()),
    };

    identity::remember(IdentityKind::EmployeeCode, &code).await;
    info!(employee_id = id, %code, by = auth.user_id, "Employee created");

    let employee = find_employee(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list (data, page, per_page, total)", body = Object)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let status = match query.status.as_deref() {
        Some(s) => Some(
            canonical::<EmploymentStatus>(s)
                .ok_or_else(|| AppError::bad_request(format!("Unknown status '{s}'")))?,
        ),
        None => None,
    };

    let filter = Filter::new()
        .raw("deleted = 0")
        .and_opt("department = ?", query.department.clone())
        .and_opt("designation = ?", query.designation.clone())
        .and_opt("employment_status = ?", status)
        .search(
            &["first_name", "last_name", "email", "employee_code"],
            query.search.as_deref(),
        );

    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let employees = fetch_page::<Employee>(
        pool.get_ref(),
        EMPLOYEE_COLUMNS,
        "employees",
        &filter,
        "id DESC",
        &page,
    )
    .await?;

    Ok(HttpResponse::Ok().json(employees))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if !auth.can_view_employee(employee_id) {
        return Err(AppError::forbidden("Not allowed to view this employee").into());
    }
    Ok(HttpResponse::Ok().json(find_employee(pool.get_ref(), employee_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/employee/me",
    responses(
        (status = 200, description = "Profile of the signed-in employee", body = Employee),
        (status = 403, description = "No employee profile linked")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn my_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    Ok(HttpResponse::Ok().json(find_employee(pool.get_ref(), employee_id).await?))
}

/// Trimmed, non-blank, sorted and without repeats.
pub fn distinct_labels(values: Vec<String>) -> Vec<String> {
    let mut labels: Vec<String> = values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

async fn labels_in_use(pool: &MySqlPool, column: &'static str) -> AppResult<Vec<String>> {
    let sql = format!(
        "SELECT DISTINCT {column} FROM employees WHERE deleted = 0 AND {column} IS NOT NULL"
    );
    let values: Vec<String> = sqlx::query_scalar(&sql).fetch_all(pool).await?;
    Ok(distinct_labels(values))
}

#[utoipa::path(
    get,
    path = "/api/employee/departments",
    responses((status = 200, description = "Departments in use", body = [String])),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn departments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(labels_in_use(pool.get_ref(), "department").await?))
}

#[utoipa::path(
    get,
    path = "/api/employee/designations",
    responses((status = 200, description = "Designations in use", body = [String])),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn designations(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(labels_in_use(pool.get_ref(), "designation").await?))
}

/// Partial update; only whitelisted columns are accepted.
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body(content = Object, description = "Any subset of the editable employee fields"),
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Unknown field or bad value"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, UPDATABLE, employee_id)?;
    let affected = match execute_update(pool.get_ref(), update).await {
        Ok(n) => n,
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::conflict("Email already used by another employee").into());
        }
        Err(e) => return Err(AppError::from(e).into()),
    };

    // MySQL reports 0 for unchanged rows, so confirm existence separately.
    let employee = find_employee(pool.get_ref(), employee_id).await?;
    info!(employee_id, affected, by = auth.user_id, "Employee updated");
    Ok(HttpResponse::Ok().json(employee))
}

/// Soft delete; the linked login is disabled.
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query("UPDATE employees SET deleted = 1 WHERE id = ? AND deleted = 0")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Employee not found").into());
    }

    sqlx::query("UPDATE users SET is_active = 0 WHERE employee_id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    info!(employee_id, by = auth.user_id, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

fn parse_role(raw: Option<&str>) -> AppResult<Role> {
    match raw.map(|r| r.trim().to_ascii_uppercase()).as_deref() {
        None | Some("EMPLOYEE") => Ok(Role::Employee),
        Some("HR") => Ok(Role::Hr),
        Some("ADMIN") => Ok(Role::Admin),
        Some(other) => Err(AppError::bad_request(format!("Unknown role '{other}'"))),
    }
}

/// Issues a login linked to the employee.
#[utoipa::path(
    post,
    path = "/api/employee/{employee_id}/credentials",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = CredentialsReq,
    responses(
        (status = 201, description = "Login created", body = Object, example = json!({
            "message": "Credentials created", "user_id": 12
        })),
        (status = 409, description = "Employee already has a login or username taken")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_credentials(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CredentialsReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();
    let role = parse_role(payload.role.as_deref())?;
    if role != Role::Employee {
        auth.require_admin()?;
    }

    find_employee(pool.get_ref(), employee_id).await?;

    let linked = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE employee_id = ?)",
    )
    .bind(employee_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(AppError::from)?;
    if linked {
        return Err(AppError::conflict("Employee already has login credentials").into());
    }

    let user_id = create_user(
        pool.get_ref(),
        &payload.username,
        &payload.password,
        role,
        Some(employee_id),
    )
    .await?;

    info!(employee_id, user_id, %role, "Employee credentials created");
    Ok(HttpResponse::Created().json(json!({
        "message": "Credentials created",
        "user_id": user_id
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_trimmed_sorted_and_unique() {
        let raw = vec![
            " Engineering".to_string(),
            "Finance".to_string(),
            "   ".to_string(),
            "Engineering ".to_string(),
            "Admin".to_string(),
        ];
        assert_eq!(distinct_labels(raw), vec!["Admin", "Engineering", "Finance"]);
    }

    #[test]
    fn next_code_follows_highest_number() {
        assert_eq!(next_employee_code([]), "EMP-0001");
        assert_eq!(
            next_employee_code(["EMP-0007", "EMP-0012", "EMP-0003"]),
            "EMP-0013"
        );
        assert_eq!(next_employee_code(["EMP-00A1", "EMP-", "OTHER-99"]), "EMP-0001");
        assert_eq!(next_employee_code(["EMP-9999"]), "EMP-10000");
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!(parse_role(None).unwrap(), Role::Employee);
        assert_eq!(parse_role(Some("hr")).unwrap(), Role::Hr);
        assert_eq!(parse_role(Some(" Admin ")).unwrap(), Role::Admin);
        assert!(parse_role(Some("root")).is_err());
    }

    #[test]
    fn whitelist_excludes_bookkeeping_columns() {
        for forbidden in ["id", "deleted", "employee_code", "created_at"] {
            assert!(UPDATABLE.iter().all(|c| c.name != forbidden));
        }
    }
}
