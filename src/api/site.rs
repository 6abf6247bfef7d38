use crate::{
    api::employee::find_employee,
    auth::auth::AuthUser,
    error::{AppError, AppResult, is_duplicate_key},
    model::{
        site::{GeofenceType, SITE_COLUMNS, Site},
        site_assignment::{ASSIGNMENT_COLUMNS, SiteAssignment},
    },
    service::geofence::{BoundingBox, GeoPoint, haversine_distance, parse_polygon},
    utils::{
        pagination::PageQuery,
        query_filter::{Filter, FilterValue, fetch_all, fetch_page, qualify},
        site_cache,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const DEFAULT_NEARBY_RADIUS: f64 = 1000.0;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SiteRequest {
    /// Generated as SITE-XXXXXXXX when omitted on create.
    pub site_code: Option<String>,
    #[schema(example = "Metro Line 3 - Package 4")]
    pub site_name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    #[schema(example = 19.0760)]
    pub latitude: f64,
    #[schema(example = 72.8777)]
    pub longitude: f64,
    pub geofence_type: Option<GeofenceType>,
    #[schema(example = 100)]
    pub geofence_radius_meters: Option<i32>,
    /// JSON array of `[lat, lon]` pairs
    #[schema(example = "[[19.07,72.87],[19.08,72.87],[19.08,72.88]]")]
    pub geofence_polygon: Option<String>,
    pub is_active: Option<bool>,
    #[schema(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub shift_start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:00:00")]
    pub shift_end_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub lunch_start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub lunch_end_time: Option<NaiveTime>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SiteListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches name, code or city
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Defaults to 1000 m
    pub radius_meters: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignmentRequest {
    pub employee_id: u64,
    pub site_id: u64,
    /// Defaults to today
    #[schema(value_type = Option<String>, format = "date")]
    pub assignment_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_primary: bool,
}

pub fn generate_site_code() -> String {
    let hex = Uuid::new_v4().to_simple().to_string();
    format!("SITE-{}", hex[..8].to_uppercase())
}

/// Coordinates in range and a usable geofence shape.
pub fn validate_site(req: &SiteRequest) -> AppResult<()> {
    if req.site_name.trim().is_empty() {
        return Err(AppError::bad_request("Site name is required"));
    }
    if !GeoPoint::new(req.latitude, req.longitude).is_valid() {
        return Err(AppError::bad_request("Invalid coordinates"));
    }
    if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
        if end < start {
            return Err(AppError::bad_request("End date cannot be before start date"));
        }
    }
    match req.geofence_type.unwrap_or(GeofenceType::Radius) {
        GeofenceType::Radius => {
            if req.geofence_radius_meters.is_some_and(|r| r <= 0) {
                return Err(AppError::bad_request("Geofence radius must be positive"));
            }
        }
        GeofenceType::Polygon => {
            let vertices = parse_polygon(req.geofence_polygon.as_deref()).unwrap_or_default();
            if vertices.len() < 3 || vertices.iter().any(|v| !v.is_valid()) {
                return Err(AppError::bad_request(
                    "Polygon geofence needs at least 3 valid [lat, lon] points",
                ));
            }
        }
    }
    Ok(())
}

/// Exact distance filter applied after the bounding-box query.
pub fn within_radius(sites: Vec<Site>, center: GeoPoint, radius_meters: f64) -> Vec<Site> {
    sites
        .into_iter()
        .filter(|s| haversine_distance(center, GeoPoint::new(s.latitude, s.longitude)) <= radius_meters)
        .collect()
}

pub async fn find_site(pool: &MySqlPool, site_id: u64) -> AppResult<Site> {
    let sql = format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ? AND deleted = 0");
    sqlx::query_as::<_, Site>(&sql)
        .bind(site_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Site not found"))
}

/// Active assignments of an employee, primary first.
pub async fn active_assignments(pool: &MySqlPool, employee_id: u64) -> AppResult<Vec<SiteAssignment>> {
    fetch_all(
        pool,
        ASSIGNMENT_COLUMNS,
        "employee_site_assignments",
        &Filter::new()
            .and("employee_id = ?", employee_id)
            .raw("is_active = 1"),
        "is_primary DESC, assignment_date DESC",
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/sites",
    request_body = SiteRequest,
    responses(
        (status = 201, description = "Site created", body = Site),
        (status = 400, description = "Invalid site"),
        (status = 409, description = "Site code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn create_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SiteRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    validate_site(&payload)?;

    let code = payload
        .site_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_site_code);

    let result = sqlx::query(
        r#"
        INSERT INTO sites
            (site_code, site_name, description, address, city, state, pincode, latitude,
             longitude, geofence_type, geofence_radius_meters, geofence_polygon, is_active,
             start_date, end_date, shift_start_time, shift_end_time, lunch_start_time,
             lunch_end_time)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&code)
    .bind(payload.site_name.trim())
    .bind(&payload.description)
    .bind(&payload.address)
    .bind(&payload.city)
    .bind(&payload.state)
    .bind(&payload.pincode)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(payload.geofence_type.unwrap_or(GeofenceType::Radius).as_ref())
    .bind(payload.geofence_radius_meters.unwrap_or(100))
    .bind(&payload.geofence_polygon)
    .bind(payload.is_active.unwrap_or(true))
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.shift_start_time)
    .bind(payload.shift_end_time)
    .bind(payload.lunch_start_time)
    .bind(payload.lunch_end_time)
    .execute(pool.get_ref())
    .await;

    let id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::conflict(format!("Site with code {code} already exists")).into());
        }
        Err(e) => return Err(AppError::from(e).into()),
    };

    site_cache::invalidate().await;
    info!(site_id = id, %code, "Site created");
    Ok(HttpResponse::Created().json(find_site(pool.get_ref(), id).await?))
}

#[utoipa::path(
    put,
    path = "/api/sites/{site_id}",
    params(("site_id" = u64, Path, description = "Site ID")),
    request_body = SiteRequest,
    responses(
        (status = 200, description = "Site updated", body = Site),
        (status = 404, description = "Site not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn update_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SiteRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let site_id = path.into_inner();
    validate_site(&payload)?;
    let current = find_site(pool.get_ref(), site_id).await?;

    let code = payload
        .site_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(&current.site_code)
        .to_string();

    let result = sqlx::query(
        r#"
        UPDATE sites SET
            site_code = ?, site_name = ?, description = ?, address = ?, city = ?, state = ?,
            pincode = ?, latitude = ?, longitude = ?, geofence_type = ?,
            geofence_radius_meters = ?, geofence_polygon = ?, is_active = ?, start_date = ?,
            end_date = ?, shift_start_time = ?, shift_end_time = ?, lunch_start_time = ?,
            lunch_end_time = ?
        WHERE id = ? AND deleted = 0
        "#,
    )
    .bind(&code)
    .bind(payload.site_name.trim())
    .bind(&payload.description)
    .bind(&payload.address)
    .bind(&payload.city)
    .bind(&payload.state)
    .bind(&payload.pincode)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(payload.geofence_type.unwrap_or(GeofenceType::Radius).as_ref())
    .bind(payload.geofence_radius_meters.unwrap_or(current.geofence_radius_meters))
    .bind(&payload.geofence_polygon)
    .bind(payload.is_active.unwrap_or(current.is_active))
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.shift_start_time)
    .bind(payload.shift_end_time)
    .bind(payload.lunch_start_time)
    .bind(payload.lunch_end_time)
    .bind(site_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {}
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::conflict(format!("Site with code {code} already exists")).into());
        }
        Err(e) => return Err(AppError::from(e).into()),
    }

    site_cache::invalidate().await;
    info!(site_id, "Site updated");
    Ok(HttpResponse::Ok().json(find_site(pool.get_ref(), site_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/sites/{site_id}",
    params(("site_id" = u64, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Site", body = Site),
        (status = 404, description = "Site not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn get_site(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(find_site(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/sites/code/{site_code}",
    params(("site_code" = String, Path, description = "Site code")),
    responses(
        (status = 200, description = "Site", body = Site),
        (status = 404, description = "Site not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn get_site_by_code(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let sql = format!("SELECT {SITE_COLUMNS} FROM sites WHERE site_code = ? AND deleted = 0");
    let site = sqlx::query_as::<_, Site>(&sql)
        .bind(path.into_inner())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("Site not found"))?;
    Ok(HttpResponse::Ok().json(site))
}

/// Paginated; `search` narrows by name, code or city.
#[utoipa::path(
    get,
    path = "/api/sites",
    params(SiteListQuery),
    responses((status = 200, description = "Paginated site list (data, page, per_page, total)", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn list_sites(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SiteListQuery>,
) -> actix_web::Result<impl Responder> {
    let filter = Filter::new()
        .raw("deleted = 0")
        .search(&["site_name", "site_code", "city"], query.search.as_deref());
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let sites =
        fetch_page::<Site>(pool.get_ref(), SITE_COLUMNS, "sites", &filter, "site_name", &page)
            .await?;
    Ok(HttpResponse::Ok().json(sites))
}

#[utoipa::path(
    get,
    path = "/api/sites/active",
    responses((status = 200, description = "Active sites", body = [Site])),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn active_sites(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let sites = site_cache::active_sites(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(sites.as_ref()))
}

#[utoipa::path(
    get,
    path = "/api/sites/nearby",
    params(NearbyQuery),
    responses(
        (status = 200, description = "Active sites within the radius", body = [Site]),
        (status = 400, description = "Invalid coordinates")
    ),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn nearby_sites(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NearbyQuery>,
) -> actix_web::Result<impl Responder> {
    let center = GeoPoint::new(query.latitude, query.longitude);
    if !center.is_valid() {
        return Err(AppError::bad_request("Invalid coordinates").into());
    }
    let radius = query.radius_meters.unwrap_or(DEFAULT_NEARBY_RADIUS).max(1.0);
    let bbox = BoundingBox::around(center, radius);
    let lon_ranges = bbox.lon_ranges();
    let lon_clause = lon_ranges
        .iter()
        .map(|_| "(longitude >= ? AND longitude <= ?)")
        .collect::<Vec<_>>()
        .join(" OR ");
    let lon_args = lon_ranges
        .iter()
        .flat_map(|&(min, max)| [FilterValue::from(min), FilterValue::from(max)])
        .collect();

    let candidates = fetch_all::<Site>(
        pool.get_ref(),
        SITE_COLUMNS,
        "sites",
        &Filter::new()
            .raw("deleted = 0")
            .raw("is_active = 1")
            .and("latitude >= ?", bbox.min_lat)
            .and("latitude <= ?", bbox.max_lat)
            .and_all(&format!("({lon_clause})"), lon_args),
        "site_name",
    )
    .await?;

    Ok(HttpResponse::Ok().json(within_radius(candidates, center, radius)))
}

/// Soft delete; the site's active assignments end today.
#[utoipa::path(
    delete,
    path = "/api/sites/{site_id}",
    params(("site_id" = u64, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Site deleted", body = Object, example = json!({"message": "Site deleted"})),
        (status = 404, description = "Site not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn delete_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let site_id = path.into_inner();

    let result = sqlx::query(
        "UPDATE sites SET deleted = 1, is_active = 0 WHERE id = ? AND deleted = 0",
    )
    .bind(site_id)
    .execute(pool.get_ref())
    .await
    .map_err(AppError::from)?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Site not found").into());
    }

    sqlx::query(
        "UPDATE employee_site_assignments SET is_active = 0, end_date = ? WHERE site_id = ? AND is_active = 1",
    )
    .bind(Local::now().date_naive())
    .bind(site_id)
    .execute(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    site_cache::invalidate().await;
    info!(site_id, "Site deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Site deleted" })))
}

#[utoipa::path(
    post,
    path = "/api/sites/assignments",
    request_body = AssignmentRequest,
    responses(
        (status = 201, description = "Employee assigned", body = SiteAssignment),
        (status = 400, description = "Already assigned to this site"),
        (status = 404, description = "Employee or site not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn assign_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<AssignmentRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let req = payload.into_inner();

    find_employee(pool, req.employee_id).await?;
    find_site(pool, req.site_id).await?;
    let assignment_date = req
        .assignment_date
        .unwrap_or_else(|| Local::now().date_naive());
    if req.end_date.is_some_and(|end| end < assignment_date) {
        return Err(AppError::bad_request("End date cannot be before assignment date").into());
    }

    let already = sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS(SELECT 1 FROM employee_site_assignments
           WHERE employee_id = ? AND site_id = ? AND is_active = 1)"#,
    )
    .bind(req.employee_id)
    .bind(req.site_id)
    .fetch_one(pool)
    .await
    .map_err(AppError::from)?;
    if already {
        return Err(AppError::bad_request("Employee is already assigned to this site").into());
    }

    if req.is_primary {
        sqlx::query(
            "UPDATE employee_site_assignments SET is_primary = 0 WHERE employee_id = ? AND is_primary = 1",
        )
        .bind(req.employee_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    }

    // Same employee, site and date reactivates the old row.
    sqlx::query(
        r#"
        INSERT INTO employee_site_assignments
            (employee_id, site_id, assignment_date, end_date, is_primary, is_active, assigned_by)
        VALUES (?, ?, ?, ?, ?, 1, ?)
        ON DUPLICATE KEY UPDATE
            is_active = 1, end_date = VALUES(end_date), is_primary = VALUES(is_primary),
            assigned_by = VALUES(assigned_by)
        "#,
    )
    .bind(req.employee_id)
    .bind(req.site_id)
    .bind(assignment_date)
    .bind(req.end_date)
    .bind(req.is_primary)
    .bind(auth.user_id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;

    let sql = format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM employee_site_assignments \
         WHERE employee_id = ? AND site_id = ? AND assignment_date = ?"
    );
    let assignment = sqlx::query_as::<_, SiteAssignment>(&sql)
        .bind(req.employee_id)
        .bind(req.site_id)
        .bind(assignment_date)
        .fetch_one(pool)
        .await
        .map_err(AppError::from)?;

    info!(
        employee_id = req.employee_id,
        site_id = req.site_id,
        primary = req.is_primary,
        "Employee assigned to site"
    );
    Ok(HttpResponse::Created().json(assignment))
}

#[utoipa::path(
    delete,
    path = "/api/sites/assignments/{assignment_id}",
    params(("assignment_id" = u64, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment ended", body = Object, example = json!({"message": "Employee removed from site"})),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn remove_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let assignment_id = path.into_inner();

    let result = sqlx::query(
        "UPDATE employee_site_assignments SET is_active = 0, end_date = ? WHERE id = ?",
    )
    .bind(Local::now().date_naive())
    .bind(assignment_id)
    .execute(pool.get_ref())
    .await
    .map_err(AppError::from)?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Assignment not found").into());
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Employee removed from site" })))
}

#[utoipa::path(
    get,
    path = "/api/sites/assignments/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses((status = 200, description = "Active assignments", body = [SiteAssignment])),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn employee_assignments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if !auth.can_view_employee(employee_id) {
        return Err(AppError::forbidden("Not allowed to view these assignments").into());
    }
    Ok(HttpResponse::Ok().json(active_assignments(pool.get_ref(), employee_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/sites/{site_id}/employees",
    params(("site_id" = u64, Path, description = "Site ID")),
    responses((status = 200, description = "Active assignments at the site", body = [SiteAssignment])),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn site_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let assignments = fetch_all::<SiteAssignment>(
        pool.get_ref(),
        ASSIGNMENT_COLUMNS,
        "employee_site_assignments",
        &Filter::new()
            .and("site_id = ?", path.into_inner())
            .raw("is_active = 1"),
        "employee_id",
    )
    .await?;
    Ok(HttpResponse::Ok().json(assignments))
}

async fn assigned_sites(pool: &MySqlPool, employee_id: u64) -> AppResult<Vec<Site>> {
    fetch_all(
        pool,
        &qualify(SITE_COLUMNS, "s"),
        "sites s JOIN employee_site_assignments a ON a.site_id = s.id",
        &Filter::new()
            .and("a.employee_id = ?", employee_id)
            .raw("a.is_active = 1")
            .raw("s.deleted = 0"),
        "a.is_primary DESC, s.site_name",
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/sites/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses((status = 200, description = "Sites the employee is assigned to", body = [Site])),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn employee_sites(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if !auth.can_view_employee(employee_id) {
        return Err(AppError::forbidden("Not allowed to view these sites").into());
    }
    Ok(HttpResponse::Ok().json(assigned_sites(pool.get_ref(), employee_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/sites/my",
    responses((status = 200, description = "Sites assigned to the signed-in employee", body = [Site])),
    security(("bearer_auth" = [])),
    tag = "Site"
)]
pub async fn my_sites(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    Ok(HttpResponse::Ok().json(assigned_sites(pool.get_ref(), employee_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::site::sample_site;

    fn request() -> SiteRequest {
        SiteRequest {
            site_code: None,
            site_name: "Thane Depot".into(),
            description: None,
            address: None,
            city: Some("Thane".into()),
            state: None,
            pincode: None,
            latitude: 19.2183,
            longitude: 72.9781,
            geofence_type: None,
            geofence_radius_meters: Some(150),
            geofence_polygon: None,
            is_active: None,
            start_date: None,
            end_date: None,
            shift_start_time: None,
            shift_end_time: None,
            lunch_start_time: None,
            lunch_end_time: None,
        }
    }

    #[test]
    fn generated_codes_have_eight_hex_digits() {
        let code = generate_site_code();
        assert!(code.starts_with("SITE-"));
        assert_eq!(code.len(), 13);
        assert!(code[5..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn radius_sites_validate() {
        assert!(validate_site(&request()).is_ok());

        let mut bad = request();
        bad.latitude = 95.0;
        assert!(validate_site(&bad).is_err());

        let mut bad = request();
        bad.geofence_radius_meters = Some(0);
        assert!(validate_site(&bad).is_err());
    }

    #[test]
    fn polygon_sites_need_three_points() {
        let mut req = request();
        req.geofence_type = Some(GeofenceType::Polygon);
        req.geofence_polygon = Some("[[19.0,72.0],[19.1,72.0]]".into());
        assert!(validate_site(&req).is_err());

        req.geofence_polygon = Some("[[19.0,72.0],[19.1,72.0],[19.1,72.1]]".into());
        assert!(validate_site(&req).is_ok());

        req.geofence_polygon = Some("not json".into());
        assert!(validate_site(&req).is_err());
    }

    #[test]
    fn nearby_keeps_only_sites_inside_radius() {
        let near = sample_site();
        let mut far = sample_site();
        far.id = 2;
        far.latitude += 0.05; // ~5.5 km north

        let center = GeoPoint::new(near.latitude, near.longitude + 0.001);
        let kept = within_radius(vec![near, far], center, 1000.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, sample_site().id);
    }
}
