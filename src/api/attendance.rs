use crate::{
    api::employee::find_employee,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        attendance::{ATTENDANCE_COLUMNS, Attendance, AttendanceStatus, RecognitionMethod},
        gps_log::PunchType,
    },
    service::{
        absence::{AbsenceSummary, mark_absent_for_date},
        work_hours::{DayHours, Punches, compute_day_hours},
    },
    utils::query_filter::{Filter, fetch_all},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

/// Longest range a single listing may cover.
const MAX_RANGE_DAYS: i64 = 366;

#[derive(Debug, Deserialize, IntoParams)]
pub struct RangeQuery {
    /// Defaults to the first day of the current month
    #[param(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DateQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkAbsentRequest {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
}

/// HR correction of one punch. Address the day either by `attendance_id`
/// or by `employee_id` plus `date`; the latter creates the record if needed.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PunchCorrection {
    pub attendance_id: Option<u64>,
    pub employee_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub punch_type: PunchType,
    #[schema(value_type = String, format = "date-time", example = "2026-03-02T09:05:00")]
    pub time: NaiveDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualMark {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// Defaults to CHECK_IN
    pub punch_type: Option<PunchType>,
    /// Time of day; defaults to now
    #[schema(value_type = Option<String>, example = "09:05:00")]
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkAbsentRequest {
    pub employee_ids: Vec<u64>,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAbsentItem {
    pub employee_id: u64,
    pub success: bool,
    pub attendance_id: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAbsentResult {
    pub marked: usize,
    pub failed: usize,
    pub results: Vec<BulkAbsentItem>,
}

pub fn resolve_range(query: &RangeQuery, today: NaiveDate) -> AppResult<(NaiveDate, NaiveDate)> {
    let end = query.end_date.unwrap_or(today);
    let start = query
        .start_date
        .unwrap_or_else(|| end.with_day0(0).unwrap_or(end));
    if end < start {
        return Err(AppError::bad_request("End date cannot be before start date"));
    }
    if (end - start).num_days() > MAX_RANGE_DAYS {
        return Err(AppError::bad_request("Date range cannot exceed one year"));
    }
    Ok((start, end))
}

pub fn punches_of(record: &Attendance) -> Punches {
    Punches {
        check_in: record.check_in_time,
        lunch_out: record.lunch_out_time,
        lunch_in: record.lunch_in_time,
        check_out: record.check_out_time,
    }
}

pub async fn find_attendance(conn: &mut MySqlConnection, attendance_id: u64) -> AppResult<Attendance> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?");
    sqlx::query_as::<_, Attendance>(&sql)
        .bind(attendance_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance record not found"))
}

/// Recomputes and stores working/overtime hours from the record's punches.
pub async fn store_hours(conn: &mut MySqlConnection, attendance_id: u64) -> AppResult<Attendance> {
    let mut record = find_attendance(conn, attendance_id).await?;
    let DayHours {
        working_hours,
        overtime_hours,
    } = compute_day_hours(record.date, &punches_of(&record));

    sqlx::query("UPDATE attendance SET working_hours = ?, overtime_hours = ? WHERE id = ?")
        .bind(working_hours)
        .bind(overtime_hours)
        .bind(attendance_id)
        .execute(conn)
        .await?;

    record.working_hours = Some(working_hours);
    record.overtime_hours = Some(overtime_hours);
    Ok(record)
}

/// Sets one punch on a day and derives the resulting status. An existing
/// punch is replaced only when `overwrite` is set. A lunch-out without a
/// check-in also stands in as the check-in, and an ABSENT day with a check-in
/// becomes PRESENT.
pub fn apply_punch(
    date: NaiveDate,
    punches: Punches,
    status: AttendanceStatus,
    punch: PunchType,
    time: NaiveDateTime,
    overwrite: bool,
) -> AppResult<(Punches, AttendanceStatus)> {
    if time.date() != date {
        return Err(AppError::bad_request(format!("Punch time must fall on {date}")));
    }

    let mut next = punches;
    let slot = match punch {
        PunchType::CheckIn => &mut next.check_in,
        PunchType::LunchOut => &mut next.lunch_out,
        PunchType::LunchIn => &mut next.lunch_in,
        PunchType::CheckOut => &mut next.check_out,
    };
    if slot.is_some() && !overwrite {
        return Err(AppError::bad_request(format!("{punch} is already recorded for {date}")));
    }
    *slot = Some(time);
    if punch == PunchType::LunchOut && next.check_in.is_none() {
        next.check_in = Some(time);
    }

    if let (Some(check_in), Some(check_out)) = (next.check_in, next.check_out) {
        if check_out <= check_in {
            return Err(AppError::bad_request("Check-out must be after check-in"));
        }
    }

    let status = match status {
        AttendanceStatus::Absent if next.check_in.is_some() => AttendanceStatus::Present,
        other => other,
    };
    Ok((next, status))
}

/// A day that already shows the employee at work is not turned into an absence.
pub fn ensure_absent_allowed(current: &str) -> AppResult<()> {
    match current.parse::<AttendanceStatus>() {
        Ok(AttendanceStatus::Present | AttendanceStatus::Late) => Err(AppError::bad_request(
            format!("Employee is already marked {current} for this date; change the status instead"),
        )),
        _ => Ok(()),
    }
}

/// Count of every status for a day plus NOT_MARKED. Past days report no
/// unmarked employees since the nightly pass has settled them.
pub fn summarize_day(
    counts: &[(String, i64)],
    unmarked: i64,
    date: NaiveDate,
    today: NaiveDate,
) -> BTreeMap<String, i64> {
    let mut summary: BTreeMap<String, i64> = AttendanceStatus::iter()
        .map(|s| (s.to_string(), 0))
        .collect();
    for (status, count) in counts {
        *summary.entry(status.clone()).or_insert(0) += count;
    }
    let not_marked = if date >= today { unmarked.max(0) } else { 0 };
    summary.insert("NOT_MARKED".to_string(), not_marked);
    summary
}

#[derive(Clone, Copy)]
enum DayRef {
    Record(u64),
    Day(u64, NaiveDate),
}

/// Creates the employee's row for the day unless one exists; returns its id.
async fn upsert_day(
    conn: &mut MySqlConnection,
    employee_id: u64,
    date: NaiveDate,
    status: AttendanceStatus,
    notes: &str,
) -> AppResult<u64> {
    let result = sqlx::query(
        "INSERT INTO attendance (employee_id, date, status, recognition_method, notes) \
         VALUES (?, ?, ?, ?, ?) ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id)",
    )
    .bind(employee_id)
    .bind(date)
    .bind(status.as_ref())
    .bind(RecognitionMethod::Manual.as_ref())
    .bind(notes)
    .execute(conn)
    .await?;
    Ok(result.last_insert_id())
}

async fn lock_attendance(conn: &mut MySqlConnection, attendance_id: u64) -> AppResult<Attendance> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ? FOR UPDATE");
    sqlx::query_as::<_, Attendance>(&sql)
        .bind(attendance_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance record not found"))
}

async fn set_punch(
    pool: &MySqlPool,
    day: DayRef,
    punch: PunchType,
    time: NaiveDateTime,
    overwrite: bool,
    notes: &str,
) -> AppResult<Attendance> {
    if let DayRef::Day(employee_id, _) = day {
        find_employee(pool, employee_id).await?;
    }

    let mut tx = pool.begin().await?;
    let attendance_id = match day {
        DayRef::Record(id) => id,
        DayRef::Day(employee_id, date) => {
            upsert_day(&mut *tx, employee_id, date, AttendanceStatus::Present, notes).await?
        }
    };
    let record = lock_attendance(&mut *tx, attendance_id).await?;
    let status = record
        .status
        .parse::<AttendanceStatus>()
        .unwrap_or(AttendanceStatus::Present);
    let (punches, status) =
        apply_punch(record.date, punches_of(&record), status, punch, time, overwrite)?;

    sqlx::query(
        "UPDATE attendance SET check_in_time = ?, lunch_out_time = ?, lunch_in_time = ?, \
         check_out_time = ?, status = ? WHERE id = ?",
    )
    .bind(punches.check_in)
    .bind(punches.lunch_out)
    .bind(punches.lunch_in)
    .bind(punches.check_out)
    .bind(status.as_ref())
    .bind(attendance_id)
    .execute(&mut *tx)
    .await?;

    let record = store_hours(&mut *tx, attendance_id).await?;
    tx.commit().await?;
    Ok(record)
}

async fn absent_for_employee(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
) -> AppResult<Attendance> {
    find_employee(pool, employee_id).await?;

    let notes = "Marked absent by HR";
    let mut tx = pool.begin().await?;
    let attendance_id =
        upsert_day(&mut *tx, employee_id, date, AttendanceStatus::Absent, notes).await?;
    let record = lock_attendance(&mut *tx, attendance_id).await?;
    ensure_absent_allowed(&record.status)?;

    sqlx::query(
        "UPDATE attendance SET status = ?, recognition_method = ?, notes = ?, \
         working_hours = 0, overtime_hours = 0 WHERE id = ?",
    )
    .bind(AttendanceStatus::Absent.as_ref())
    .bind(RecognitionMethod::Manual.as_ref())
    .bind(notes)
    .bind(attendance_id)
    .execute(&mut *tx)
    .await?;

    let record = find_attendance(&mut *tx, attendance_id).await?;
    tx.commit().await?;
    Ok(record)
}

async fn record_for_day(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
) -> AppResult<Option<Attendance>> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?");
    Ok(sqlx::query_as::<_, Attendance>(&sql)
        .bind(employee_id)
        .bind(date)
        .fetch_optional(pool)
        .await?)
}

async fn records_between(
    pool: &MySqlPool,
    employee_id: u64,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<Vec<Attendance>> {
    fetch_all(
        pool,
        ATTENDANCE_COLUMNS,
        "attendance",
        &Filter::new()
            .and("employee_id = ?", employee_id)
            .and("date >= ?", start)
            .and("date <= ?", end),
        "date DESC",
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/attendance/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID"), RangeQuery),
    responses(
        (status = 200, description = "Attendance records, newest first", body = [Attendance]),
        (status = 400, description = "Invalid range"),
        (status = 403, description = "Not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn employee_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if !auth.can_view_employee(employee_id) {
        return Err(AppError::forbidden("Not allowed to view this attendance").into());
    }
    let (start, end) = resolve_range(&query, Local::now().date_naive())?;
    Ok(HttpResponse::Ok().json(records_between(pool.get_ref(), employee_id, start, end).await?))
}

#[utoipa::path(
    get,
    path = "/api/attendance/my",
    params(RangeQuery),
    responses((status = 200, description = "My attendance records", body = [Attendance])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let (start, end) = resolve_range(&query, Local::now().date_naive())?;
    Ok(HttpResponse::Ok().json(records_between(pool.get_ref(), employee_id, start, end).await?))
}

#[utoipa::path(
    get,
    path = "/api/attendance/date",
    params(DateQuery),
    responses((status = 200, description = "All records for the date", body = [Attendance])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_for_date(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DateQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let records = fetch_all::<Attendance>(
        pool.get_ref(),
        ATTENDANCE_COLUMNS,
        "attendance",
        &Filter::new().and("date = ?", date),
        "employee_id",
    )
    .await?;
    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    post,
    path = "/api/attendance/{attendance_id}/recompute",
    params(("attendance_id" = u64, Path, description = "Attendance ID")),
    responses(
        (status = 200, description = "Record with fresh hours", body = Attendance),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn recompute_hours(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let mut conn = pool.acquire().await.map_err(AppError::from)?;
    let record = store_hours(&mut conn, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}/status",
    params(("attendance_id" = u64, Path, description = "Attendance ID")),
    request_body = StatusUpdate,
    responses(
        (status = 200, description = "Status updated", body = Object, example = json!({"message": "Attendance status updated"})),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<StatusUpdate>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let attendance_id = path.into_inner();

    let result = sqlx::query(
        "UPDATE attendance SET status = ?, notes = COALESCE(?, notes) WHERE id = ?",
    )
    .bind(payload.status.as_ref())
    .bind(&payload.notes)
    .bind(attendance_id)
    .execute(pool.get_ref())
    .await
    .map_err(AppError::from)?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Attendance record not found").into());
    }

    info!(attendance_id, status = %payload.status, by = auth.user_id, "Attendance status changed");
    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance status updated" })))
}

/// Same pass the nightly job runs, for one chosen day.
#[utoipa::path(
    post,
    path = "/api/attendance/mark-absent",
    request_body = MarkAbsentRequest,
    responses(
        (status = 200, description = "Marking summary", body = AbsenceSummary),
        (status = 400, description = "Date in the future")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_absent(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<MarkAbsentRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    if payload.date > Local::now().date_naive() {
        return Err(AppError::bad_request("Cannot mark absence for a future date").into());
    }
    let summary = mark_absent_for_date(pool.get_ref(), payload.date).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    put,
    path = "/api/attendance/punch-time",
    request_body = PunchCorrection,
    responses(
        (status = 200, description = "Corrected record with fresh hours", body = Attendance),
        (status = 400, description = "No day given or time off the record's date"),
        (status = 404, description = "Record or employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn correct_punch(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PunchCorrection>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let day = match (payload.attendance_id, payload.employee_id, payload.date) {
        (Some(id), _, _) => DayRef::Record(id),
        (None, Some(employee_id), Some(date)) => DayRef::Day(employee_id, date),
        _ => {
            return Err(AppError::bad_request(
                "Provide attendance_id, or employee_id together with date",
            )
            .into());
        }
    };

    let record = set_punch(
        pool.get_ref(),
        day,
        payload.punch_type,
        payload.time,
        true,
        "Punch time set by HR",
    )
    .await?;
    info!(
        attendance_id = record.id,
        punch = %payload.punch_type,
        by = auth.user_id,
        "Punch time corrected"
    );
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/mark-manual",
    request_body = ManualMark,
    responses(
        (status = 200, description = "Record with the new punch", body = Attendance),
        (status = 400, description = "Future date or punch already recorded"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_manual(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ManualMark>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let now = Local::now().naive_local();
    if payload.date > now.date() {
        return Err(AppError::bad_request("Cannot mark attendance for a future date").into());
    }
    let punch = payload.punch_type.unwrap_or(PunchType::CheckIn);
    let time = payload.date.and_time(payload.time.unwrap_or(now.time()));

    let record = set_punch(
        pool.get_ref(),
        DayRef::Day(payload.employee_id, payload.date),
        punch,
        time,
        false,
        "Marked manually by HR",
    )
    .await?;
    info!(employee_id = payload.employee_id, date = %payload.date, punch = %punch, by = auth.user_id, "Attendance marked manually");
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/employee/{employee_id}/absent",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = MarkAbsentRequest,
    responses(
        (status = 200, description = "Absent record", body = Attendance),
        (status = 400, description = "Future date or employee already present"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_employee_absent(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<MarkAbsentRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    if payload.date > Local::now().date_naive() {
        return Err(AppError::bad_request("Cannot mark absence for a future date").into());
    }
    let employee_id = path.into_inner();
    let record = absent_for_employee(pool.get_ref(), employee_id, payload.date).await?;
    info!(employee_id, date = %payload.date, by = auth.user_id, "Employee marked absent");
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/bulk-mark-absent",
    request_body = BulkAbsentRequest,
    responses(
        (status = 200, description = "Per-employee outcome", body = BulkAbsentResult),
        (status = 400, description = "Future date or empty list")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn bulk_mark_absent(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<BulkAbsentRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    if payload.date > Local::now().date_naive() {
        return Err(AppError::bad_request("Cannot mark absence for a future date").into());
    }
    if payload.employee_ids.is_empty() {
        return Err(AppError::bad_request("No employees given").into());
    }

    let mut results = Vec::with_capacity(payload.employee_ids.len());
    for &employee_id in &payload.employee_ids {
        let item = match absent_for_employee(pool.get_ref(), employee_id, payload.date).await {
            Ok(record) => BulkAbsentItem {
                employee_id,
                success: true,
                attendance_id: Some(record.id),
                error: None,
            },
            Err(e) => {
                warn!(employee_id, error = %e, "Could not mark absent");
                BulkAbsentItem {
                    employee_id,
                    success: false,
                    attendance_id: None,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(item);
    }

    let marked = results.iter().filter(|r| r.success).count();
    info!(date = %payload.date, marked, by = auth.user_id, "Bulk absence marking");
    Ok(HttpResponse::Ok().json(BulkAbsentResult {
        marked,
        failed: results.len() - marked,
        results,
    }))
}

#[utoipa::path(
    get,
    path = "/api/attendance/today/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Today's record, or null", body = Attendance),
        (status = 403, description = "Not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today_for_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if !auth.can_view_employee(employee_id) {
        return Err(AppError::forbidden("Not allowed to view this attendance").into());
    }
    let record = record_for_day(pool.get_ref(), employee_id, Local::now().date_naive()).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance/my/today",
    responses((status = 200, description = "My record for today, or null", body = Attendance)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;
    let record = record_for_day(pool.get_ref(), employee_id, Local::now().date_naive()).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance/daily/summary",
    params(DateQuery),
    responses((status = 200, description = "Count per status plus NOT_MARKED", body = Object,
        example = json!({"PRESENT": 41, "ABSENT": 3, "ON_LEAVE": 2, "HALF_DAY": 0, "LATE": 4, "NOT_MARKED": 5}))),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn daily_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DateQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let today = Local::now().date_naive();
    let date = query.date.unwrap_or(today);

    let counts: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM attendance WHERE date = ? GROUP BY status")
            .bind(date)
            .fetch_all(pool.get_ref())
            .await
            .map_err(AppError::from)?;
    let unmarked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM employees e WHERE e.deleted = 0 AND e.employment_status = 'ACTIVE' \
         AND NOT EXISTS (SELECT 1 FROM attendance a WHERE a.employee_id = e.id AND a.date = ?)",
    )
    .bind(date)
    .fetch_one(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    Ok(HttpResponse::Ok().json(summarize_day(&counts, unmarked, date, today)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    #[test]
    fn range_defaults_to_month_to_date() {
        let q = RangeQuery {
            start_date: None,
            end_date: None,
        };
        assert_eq!(resolve_range(&q, d(3, 17)).unwrap(), (d(3, 1), d(3, 17)));
    }

    #[test]
    fn inverted_or_oversized_ranges_fail() {
        let inverted = RangeQuery {
            start_date: Some(d(3, 10)),
            end_date: Some(d(3, 9)),
        };
        assert!(resolve_range(&inverted, d(3, 17)).is_err());

        let huge = RangeQuery {
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1),
            end_date: Some(d(3, 9)),
        };
        assert!(resolve_range(&huge, d(3, 17)).is_err());
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        d(3, day).and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn correcting_check_in_turns_absent_into_present() {
        let (punches, status) = apply_punch(
            d(3, 3),
            Punches::default(),
            AttendanceStatus::Absent,
            PunchType::CheckIn,
            at(3, 9, 5),
            true,
        )
        .unwrap();
        assert_eq!(punches.check_in, Some(at(3, 9, 5)));
        assert_eq!(status, AttendanceStatus::Present);

        let (_, kept) = apply_punch(
            d(3, 3),
            punches,
            AttendanceStatus::Late,
            PunchType::CheckOut,
            at(3, 18, 0),
            true,
        )
        .unwrap();
        assert_eq!(kept, AttendanceStatus::Late);
    }

    #[test]
    fn lunch_out_without_check_in_fills_both() {
        let (punches, _) = apply_punch(
            d(3, 3),
            Punches::default(),
            AttendanceStatus::Present,
            PunchType::LunchOut,
            at(3, 13, 0),
            false,
        )
        .unwrap();
        assert_eq!(punches.check_in, Some(at(3, 13, 0)));
        assert_eq!(punches.lunch_out, Some(at(3, 13, 0)));
    }

    #[test]
    fn punch_rules_reject_bad_corrections() {
        let checked_in = Punches {
            check_in: Some(at(3, 9, 0)),
            ..Punches::default()
        };
        let present = AttendanceStatus::Present;

        // time on another day
        assert!(apply_punch(d(3, 3), checked_in, present, PunchType::CheckOut, at(4, 18, 0), true).is_err());
        // check-out before check-in
        assert!(apply_punch(d(3, 3), checked_in, present, PunchType::CheckOut, at(3, 8, 0), true).is_err());
        // manual marking never replaces a punch
        assert!(apply_punch(d(3, 3), checked_in, present, PunchType::CheckIn, at(3, 9, 30), false).is_err());
        // a correction does
        let (fixed, _) =
            apply_punch(d(3, 3), checked_in, present, PunchType::CheckIn, at(3, 9, 30), true).unwrap();
        assert_eq!(fixed.check_in, Some(at(3, 9, 30)));
    }

    #[test]
    fn absence_cannot_override_a_worked_day() {
        assert!(ensure_absent_allowed("PRESENT").is_err());
        assert!(ensure_absent_allowed("LATE").is_err());
        assert!(ensure_absent_allowed("ABSENT").is_ok());
        assert!(ensure_absent_allowed("ON_LEAVE").is_ok());
    }

    #[test]
    fn summary_lists_every_status_and_unmarked_only_from_today() {
        let counts = vec![("PRESENT".to_string(), 4), ("LATE".to_string(), 1)];

        let today = summarize_day(&counts, 3, d(3, 17), d(3, 17));
        assert_eq!(today["PRESENT"], 4);
        assert_eq!(today["LATE"], 1);
        assert_eq!(today["ABSENT"], 0);
        assert_eq!(today["HALF_DAY"], 0);
        assert_eq!(today["NOT_MARKED"], 3);

        let past = summarize_day(&counts, 3, d(3, 16), d(3, 17));
        assert_eq!(past["NOT_MARKED"], 0);
    }
}
