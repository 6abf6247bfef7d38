use std::collections::BTreeMap;
use std::str::FromStr;

use crate::{
    api::{
        attendance::{DateQuery, store_hours},
        employee::find_employee,
        site::{active_assignments, find_site},
    },
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult},
    model::{
        attendance::{AttendanceStatus, RecognitionMethod},
        gps_log::{GPS_LOG_COLUMNS, GpsAttendanceLog, NetworkStatus, PunchType, SyncStatus},
        site::Site,
        site_assignment::SiteAssignment,
    },
    service::{
        geofence::{GeoPoint, Geofence},
        punch::{DayPunches, validate_fix_age},
    },
    utils::{
        pagination::PageQuery,
        query_filter::{Filter, fetch_all, fetch_page, qualify},
        site_cache,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum::IntoEnumIterator;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

const LOG_VIEW_FROM: &str = "gps_attendance_logs l \
    JOIN employees e ON e.id = l.employee_id \
    LEFT JOIN sites s ON s.id = l.site_id";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PunchRequest {
    /// Defaults to the caller's own employee record; HR/Admin may punch for others.
    pub employee_id: Option<u64>,
    pub punch_type: PunchType,
    #[schema(example = 19.0760)]
    pub latitude: f64,
    #[schema(example = 72.8777)]
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
    pub altitude: Option<f64>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    #[schema(example = "Pixel 7")]
    pub device_model: Option<String>,
    #[schema(example = "Android 14")]
    pub os_version: Option<String>,
    #[schema(example = "2.3.1")]
    pub app_version: Option<String>,
    #[serde(default)]
    pub is_mock_location: bool,
    pub network_status: Option<NetworkStatus>,
    /// Device time of an offline punch
    #[schema(value_type = Option<String>, format = "date-time")]
    pub offline_timestamp: Option<NaiveDateTime>,
    /// When the GPS fix was taken
    #[schema(value_type = Option<String>, format = "date-time")]
    pub location_timestamp: Option<NaiveDateTime>,
    /// Used only when no assigned site matches
    pub site_id: Option<u64>,
}

/// A log row with the employee and site it belongs to.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct GpsLogView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub log: GpsAttendanceLog,
    pub employee_code: String,
    pub employee_name: String,
    pub site_name: Option<String>,
    pub site_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResult {
    pub index: usize,
    pub success: bool,
    pub log: Option<GpsLogView>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MapQuery {
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub employee_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LogRangeQuery {
    #[param(value_type = String, format = "date-time")]
    pub start: NaiveDateTime,
    #[param(value_type = String, format = "date-time")]
    pub end: NaiveDateTime,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn view_columns() -> String {
    format!(
        "{}, e.employee_code, CONCAT(e.first_name, ' ', e.last_name) AS employee_name, \
         s.site_name, s.site_code",
        qualify(GPS_LOG_COLUMNS, "l")
    )
}

/// `[00:00 of date, 00:00 of the next day)`
pub fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    let end = date
        .succ_opt()
        .map(|next| next.and_time(NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MAX);
    (start, end)
}

pub fn time_column(punch: PunchType) -> &'static str {
    match punch {
        PunchType::CheckIn => "check_in_time",
        PunchType::LunchOut => "lunch_out_time",
        PunchType::LunchIn => "lunch_in_time",
        PunchType::CheckOut => "check_out_time",
    }
}

/// First active assignment valid today whose geofence contains the point,
/// otherwise the primary assignment's site.
pub fn resolve_site<'a>(
    assignments: &[SiteAssignment],
    sites: &'a [Site],
    point: GeoPoint,
    today: NaiveDate,
) -> Option<&'a Site> {
    let site_of = |a: &SiteAssignment| sites.iter().find(|s| s.id == a.site_id);

    assignments
        .iter()
        .filter(|a| a.is_valid_on(today))
        .filter_map(site_of)
        .find(|site| Geofence::from_site(site).contains(point))
        .or_else(|| {
            assignments
                .iter()
                .filter(|a| a.is_active && a.is_primary)
                .find_map(site_of)
        })
}

/// Every punch type with its count, zero when absent.
pub fn punch_counts(rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> =
        PunchType::iter().map(|t| (t.to_string(), 0)).collect();
    for (kind, n) in rows {
        if let Ok(kind) = PunchType::from_str(&kind) {
            counts.insert(kind.to_string(), n);
        }
    }
    counts
}

pub async fn find_log_view(pool: &MySqlPool, log_id: u64) -> AppResult<GpsLogView> {
    let sql = format!("SELECT {} FROM {LOG_VIEW_FROM} WHERE l.id = ?", view_columns());
    sqlx::query_as::<_, GpsLogView>(&sql)
        .bind(log_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance log not found"))
}

async fn logs_where(pool: &MySqlPool, filter: Filter) -> AppResult<Vec<GpsLogView>> {
    fetch_all(pool, &view_columns(), LOG_VIEW_FROM, &filter, "l.punch_time").await
}

fn on_day(filter: Filter, date: NaiveDate) -> Filter {
    let (start, end) = day_bounds(date);
    filter
        .and("l.punch_time >= ?", start)
        .and("l.punch_time < ?", end)
}

/// Punches captured offline record when they reached the server.
pub fn synced_at(req: &PunchRequest, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let offline = req.offline_timestamp.is_some()
        || req.network_status == Some(NetworkStatus::Offline);
    offline.then_some(now)
}

/// Validates a punch and records it against today's attendance.
#[instrument(
    name = "gps_mark",
    skip(pool, config, auth, req),
    fields(user_id = auth.user_id, punch = %req.punch_type)
)]
pub async fn mark_punch(
    pool: &MySqlPool,
    config: &Config,
    auth: &AuthUser,
    req: &PunchRequest,
) -> AppResult<GpsLogView> {
    let point = GeoPoint::new(req.latitude, req.longitude);
    if !point.is_valid() {
        return Err(AppError::bad_request("Invalid GPS coordinates"));
    }
    if req.is_mock_location {
        warn!("Mock location rejected");
        return Err(AppError::bad_request(
            "Mock location detected. Please disable mock location and try again.",
        ));
    }

    let now = Local::now().naive_local();
    let today = now.date();
    validate_fix_age(
        req.location_timestamp,
        now,
        config.location_max_age_secs,
        config.location_max_skew_secs,
    )?;

    let employee_id = match req.employee_id {
        Some(id) if auth.employee_id != Some(id) => {
            auth.require_hr_or_admin()?;
            id
        }
        Some(id) => id,
        None => auth.require_employee()?,
    };
    let employee = find_employee(pool, employee_id).await?;
    if !employee.uses_gps_attendance() {
        return Err(AppError::bad_request(format!(
            "Employee is not assigned to GPS-based attendance. Current method: {}",
            employee.attendance_method
        )));
    }

    let assignments = active_assignments(pool, employee_id).await?;
    let sites = site_cache::active_sites(pool).await?;
    let site = match resolve_site(&assignments, &sites, point, today) {
        Some(site) => site.clone(),
        None => match req.site_id {
            Some(site_id) => find_site(pool, site_id).await?,
            None => {
                return Err(AppError::bad_request(
                    "You are not assigned to any site or you are outside all assigned sites. \
                     Please contact your administrator or move to an assigned site to mark attendance.",
                ));
            }
        },
    };

    let fence = Geofence::from_site(&site);
    let distance = fence.distance_from_center(point);
    if !fence.contains(point) {
        info!(site_id = site.id, distance, "Punch outside geofence");
        return Err(AppError::bad_request(format!(
            "You are {:.0} meters away from the site boundary. You must be inside the site to mark attendance. Please move closer to the site.",
            fence.distance_outside(point)
        )));
    }

    let mut tx = pool.begin().await?;

    // The upsert locks today's row, serializing punches for the employee.
    let attendance_id = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, status, recognition_method)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id)
        "#,
    )
    .bind(employee_id)
    .bind(today)
    .bind(AttendanceStatus::Present.as_ref())
    .bind(RecognitionMethod::GpsBased.as_ref())
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    let (day_start, day_end) = day_bounds(today);
    let recorded = sqlx::query_scalar::<_, String>(
        "SELECT punch_type FROM gps_attendance_logs WHERE employee_id = ? AND punch_time >= ? AND punch_time < ?",
    )
    .bind(employee_id)
    .bind(day_start)
    .bind(day_end)
    .fetch_all(&mut *tx)
    .await?;
    DayPunches::from_types(recorded.iter().filter_map(|t| PunchType::from_str(t).ok()))
        .validate_next(req.punch_type)?;

    let log_id = sqlx::query(
        r#"
        INSERT INTO gps_attendance_logs
            (employee_id, attendance_id, site_id, punch_type, punch_time, latitude, longitude,
             accuracy_meters, altitude, distance_from_site, is_inside_geofence, network_status,
             sync_status, offline_timestamp, device_id, device_name, device_model, os_version,
             app_version, is_mock_location, synced_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(employee_id)
    .bind(attendance_id)
    .bind(site.id)
    .bind(req.punch_type.as_ref())
    .bind(now)
    .bind(req.latitude)
    .bind(req.longitude)
    .bind(req.accuracy_meters)
    .bind(req.altitude)
    .bind(distance)
    .bind(req.network_status.unwrap_or(NetworkStatus::Online).as_ref())
    .bind(SyncStatus::Synced.as_ref())
    .bind(req.offline_timestamp)
    .bind(&req.device_id)
    .bind(&req.device_name)
    .bind(&req.device_model)
    .bind(&req.os_version)
    .bind(&req.app_version)
    .bind(synced_at(req, now))
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    let sql = format!(
        "UPDATE attendance SET {} = ? WHERE id = ?",
        time_column(req.punch_type)
    );
    sqlx::query(&sql)
        .bind(now)
        .bind(attendance_id)
        .execute(&mut *tx)
        .await?;

    if req.punch_type == PunchType::CheckOut {
        let record = store_hours(&mut *tx, attendance_id).await?;
        info!(
            attendance_id,
            working = record.working_hours,
            overtime = record.overtime_hours,
            "Day closed"
        );
    }

    tx.commit().await?;
    info!(employee_id, site_id = site.id, log_id, "Punch recorded");

    find_log_view(pool, log_id).await
}

#[utoipa::path(
    post,
    path = "/api/gps-attendance/mark",
    request_body = PunchRequest,
    responses(
        (status = 201, description = "Punch recorded", body = GpsLogView),
        (status = 400, description = "Rejected punch", body = Object, example = json!({
            "message": "Check-in already recorded for today"
        })),
        (status = 404, description = "Employee or site not found")
    ),
    security(("bearer_auth" = [])),
    tag = "GPS Attendance"
)]
pub async fn mark(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<PunchRequest>,
) -> actix_web::Result<impl Responder> {
    let log = mark_punch(pool.get_ref(), &config, &auth, &payload).await?;
    Ok(HttpResponse::Created().json(log))
}

/// Punches queued while offline, replayed in order.
#[utoipa::path(
    post,
    path = "/api/gps-attendance/sync",
    request_body = [PunchRequest],
    responses((status = 200, description = "Outcome per punch", body = [SyncResult])),
    security(("bearer_auth" = [])),
    tag = "GPS Attendance"
)]
pub async fn sync_offline(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<Vec<PunchRequest>>,
) -> actix_web::Result<impl Responder> {
    let mut results = Vec::with_capacity(payload.len());
    for (index, mut req) in payload.into_inner().into_iter().enumerate() {
        req.network_status = req.network_status.or(Some(NetworkStatus::Offline));
        let result = match mark_punch(pool.get_ref(), &config, &auth, &req).await {
            Ok(log) => SyncResult {
                index,
                success: true,
                log: Some(log),
                error: None,
            },
            Err(e) => SyncResult {
                index,
                success: false,
                log: None,
                error: Some(e.to_string()),
            },
        };
        results.push(result);
    }

    let synced = results.iter().filter(|r| r.success).count();
    info!(user_id = auth.user_id, synced, total = results.len(), "Offline punches synced");
    Ok(HttpResponse::Ok().json(results))
}

#[utoipa::path(
    get,
    path = "/api/gps-attendance/my",
    params(DateQuery),
    responses((status = 200, description = "My punches for the day", body = [GpsLogView])),
    security(("bearer_auth" = [])),
    tag = "GPS Attendance"
)]
pub async fn my_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DateQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let filter = on_day(Filter::new().and("l.employee_id = ?", employee_id), date);
    Ok(HttpResponse::Ok().json(logs_where(pool.get_ref(), filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/gps-attendance/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID"), DateQuery),
    responses((status = 200, description = "Punches of the employee for the day", body = [GpsLogView])),
    security(("bearer_auth" = [])),
    tag = "GPS Attendance"
)]
pub async fn employee_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<DateQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if !auth.can_view_employee(employee_id) {
        return Err(AppError::forbidden("Not allowed to view these punches").into());
    }
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let filter = on_day(Filter::new().and("l.employee_id = ?", employee_id), date);
    Ok(HttpResponse::Ok().json(logs_where(pool.get_ref(), filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/gps-attendance/site/{site_id}",
    params(("site_id" = u64, Path, description = "Site ID"), DateQuery),
    responses((status = 200, description = "Punches at the site for the day", body = [GpsLogView])),
    security(("bearer_auth" = [])),
    tag = "GPS Attendance"
)]
pub async fn site_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<DateQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let filter = on_day(Filter::new().and("l.site_id = ?", path.into_inner()), date);
    Ok(HttpResponse::Ok().json(logs_where(pool.get_ref(), filter).await?))
}

/// Map dashboard feed.
#[utoipa::path(
    get,
    path = "/api/gps-attendance/map",
    params(MapQuery),
    responses((status = 200, description = "All punches for the day", body = [GpsLogView])),
    security(("bearer_auth" = [])),
    tag = "GPS Attendance"
)]
pub async fn map_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MapQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let filter = on_day(
        Filter::new().and_opt("l.employee_id = ?", query.employee_id),
        date,
    );
    Ok(HttpResponse::Ok().json(logs_where(pool.get_ref(), filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/gps-attendance/logs",
    params(LogRangeQuery),
    responses(
        (status = 200, description = "Paginated punches (data, page, per_page, total)", body = Object),
        (status = 400, description = "Invalid range")
    ),
    security(("bearer_auth" = [])),
    tag = "GPS Attendance"
)]
pub async fn logs_in_range(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LogRangeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    if query.end < query.start {
        return Err(AppError::bad_request("End must not be before start").into());
    }
    let filter = Filter::new()
        .and("l.punch_time >= ?", query.start)
        .and("l.punch_time <= ?", query.end);
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let logs = fetch_page::<GpsLogView>(
        pool.get_ref(),
        &view_columns(),
        LOG_VIEW_FROM,
        &filter,
        "l.punch_time DESC",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(logs))
}

#[utoipa::path(
    get,
    path = "/api/gps-attendance/summary",
    params(DateQuery),
    responses((status = 200, description = "Punch count per type", body = Object, example = json!({
        "CHECK_IN": 42, "CHECK_OUT": 40, "LUNCH_IN": 35, "LUNCH_OUT": 36
    }))),
    security(("bearer_auth" = [])),
    tag = "GPS Attendance"
)]
pub async fn punch_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DateQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let (start, end) = day_bounds(date);
    let rows = sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT punch_type, COUNT(*) FROM gps_attendance_logs
        WHERE punch_time >= ? AND punch_time < ?
        GROUP BY punch_type
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool.get_ref())
    .await
    .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(punch_counts(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::site::sample_site;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn assignment(site_id: u64, primary: bool) -> SiteAssignment {
        SiteAssignment {
            id: site_id,
            employee_id: 7,
            site_id,
            assignment_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: None,
            is_primary: primary,
            is_active: true,
            assigned_by: None,
            created_at: today().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    fn sites() -> Vec<Site> {
        let near = sample_site();
        let mut far = sample_site();
        far.id = 9;
        far.latitude += 0.5;
        vec![near, far]
    }

    #[test]
    fn containing_site_wins_over_primary() {
        let sites = sites();
        let here = GeoPoint::new(sites[0].latitude, sites[0].longitude);
        let assignments = [assignment(9, true), assignment(3, false)];
        let site = resolve_site(&assignments, &sites, here, today()).unwrap();
        assert_eq!(site.id, 3);
    }

    #[test]
    fn primary_site_is_the_fallback() {
        let sites = sites();
        let elsewhere = GeoPoint::new(0.0, 0.0);
        let assignments = [assignment(3, false), assignment(9, true)];
        let site = resolve_site(&assignments, &sites, elsewhere, today()).unwrap();
        assert_eq!(site.id, 9);

        let no_primary = [assignment(3, false)];
        assert!(resolve_site(&no_primary, &sites, elsewhere, today()).is_none());
    }

    #[test]
    fn expired_assignment_does_not_match() {
        let sites = sites();
        let here = GeoPoint::new(sites[0].latitude, sites[0].longitude);
        let mut expired = assignment(3, false);
        expired.end_date = NaiveDate::from_ymd_opt(2025, 2, 28);
        assert!(resolve_site(&[expired], &sites, here, today()).is_none());
    }

    #[test]
    fn counts_cover_every_punch_type() {
        let counts = punch_counts(vec![("CHECK_IN".into(), 4), ("bogus".into(), 9)]);
        assert_eq!(counts.len(), 4);
        assert_eq!(counts["CHECK_IN"], 4);
        assert_eq!(counts["CHECK_OUT"], 0);
    }

    #[test]
    fn day_bounds_are_half_open() {
        let (start, end) = day_bounds(today());
        assert_eq!(start, today().and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn punch_types_map_to_columns() {
        assert_eq!(time_column(PunchType::LunchOut), "lunch_out_time");
        assert_eq!(time_column(PunchType::CheckOut), "check_out_time");
    }

    #[test]
    fn offline_punches_carry_their_sync_time() {
        let now = today().and_hms_opt(9, 30, 0).unwrap();
        let mut req: PunchRequest = serde_json::from_value(serde_json::json!({
            "punch_type": "CHECK_IN",
            "latitude": 19.076,
            "longitude": 72.8777,
            "device_model": "Pixel 7",
            "os_version": "Android 14",
            "app_version": "2.3.1"
        }))
        .unwrap();
        assert_eq!(req.device_model.as_deref(), Some("Pixel 7"));
        assert_eq!(synced_at(&req, now), None);

        req.offline_timestamp = today().and_hms_opt(9, 2, 0);
        assert_eq!(synced_at(&req, now), Some(now));

        req.offline_timestamp = None;
        req.network_status = Some(NetworkStatus::Offline);
        assert_eq!(synced_at(&req, now), Some(now));
    }
}
