use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, conflict_on_duplicate},
    model::holiday::{HOLIDAY_COLUMNS, Holiday},
    service::holiday::{apply_holiday, clear_holiday},
    utils::query_filter::{Filter, fetch_all},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct HolidayRequest {
    #[schema(value_type = String, format = "date", example = "2026-01-26")]
    pub date: NaiveDate,
    #[schema(example = "Republic Day")]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to true
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HolidayRangeQuery {
    #[param(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[param(value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

/// Normalized attendance to remove and to create when a holiday changes
/// from `(date, active)` to `(date, active)`.
pub fn attendance_moves(
    before: (NaiveDate, bool),
    after: (NaiveDate, bool),
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    if before == after {
        return (None, None);
    }
    let clear = before.1.then_some(before.0);
    let apply = after.1.then_some(after.0);
    (clear, apply)
}

fn validate(req: &HolidayRequest) -> AppResult<()> {
    if req.name.trim().is_empty() {
        return Err(AppError::bad_request("Holiday name is required"));
    }
    Ok(())
}

async fn find_holiday(pool: &MySqlPool, holiday_id: u64) -> AppResult<Holiday> {
    let sql = format!("SELECT {HOLIDAY_COLUMNS} FROM holidays WHERE id = ? AND deleted = 0");
    sqlx::query_as::<_, Holiday>(&sql)
        .bind(holiday_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Holiday not found"))
}

fn date_taken(date: NaiveDate) -> String {
    format!("A holiday already exists on {date}")
}

/// Early check for a readable error; `uq_holidays_live_date` has the final say.
async fn ensure_date_free(pool: &MySqlPool, date: NaiveDate, except: Option<u64>) -> AppResult<()> {
    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM holidays WHERE date = ? AND deleted = 0 AND id <> ?)",
    )
    .bind(date)
    .bind(except.unwrap_or(0))
    .fetch_one(pool)
    .await?;
    if taken {
        return Err(AppError::conflict(date_taken(date)));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/holidays",
    request_body = HolidayRequest,
    responses(
        (status = 201, description = "Holiday created", body = Holiday),
        (status = 409, description = "Date already has a holiday")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<HolidayRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    validate(&payload)?;
    let pool = pool.get_ref();
    ensure_date_free(pool, payload.date, None).await?;

    let is_active = payload.is_active.unwrap_or(true);
    let id = sqlx::query(
        "INSERT INTO holidays (date, name, description, is_active) VALUES (?, ?, ?, ?)",
    )
    .bind(payload.date)
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(is_active)
    .execute(pool)
    .await
    .map_err(|e| conflict_on_duplicate(e, || date_taken(payload.date)))?
    .last_insert_id();

    if is_active {
        apply_holiday(pool, payload.date).await?;
    }
    info!(holiday_id = id, date = %payload.date, "Holiday created");
    Ok(HttpResponse::Created().json(find_holiday(pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    request_body = HolidayRequest,
    responses(
        (status = 200, description = "Holiday updated", body = Holiday),
        (status = 404, description = "Holiday not found"),
        (status = 409, description = "Date already has a holiday")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn update_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<HolidayRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    validate(&payload)?;
    let pool = pool.get_ref();
    let holiday_id = path.into_inner();
    let current = find_holiday(pool, holiday_id).await?;
    if payload.date != current.date {
        ensure_date_free(pool, payload.date, Some(holiday_id)).await?;
    }

    let is_active = payload.is_active.unwrap_or(current.is_active);
    sqlx::query(
        "UPDATE holidays SET date = ?, name = ?, description = ?, is_active = ? WHERE id = ?",
    )
    .bind(payload.date)
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(is_active)
    .bind(holiday_id)
    .execute(pool)
    .await
    .map_err(|e| conflict_on_duplicate(e, || date_taken(payload.date)))?;

    let (clear, apply) = attendance_moves(
        (current.date, current.is_active),
        (payload.date, is_active),
    );
    if let Some(date) = clear {
        clear_holiday(pool, date).await?;
    }
    if let Some(date) = apply {
        apply_holiday(pool, date).await?;
    }

    info!(holiday_id, "Holiday updated");
    Ok(HttpResponse::Ok().json(find_holiday(pool, holiday_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 200, description = "Holiday deleted", body = Object, example = json!({"message": "Holiday deleted"})),
        (status = 404, description = "Holiday not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let holiday = find_holiday(pool, path.into_inner()).await?;

    sqlx::query("UPDATE holidays SET deleted = 1 WHERE id = ?")
        .bind(holiday.id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    if holiday.is_active {
        clear_holiday(pool, holiday.date).await?;
    }

    info!(holiday_id = holiday.id, "Holiday deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Holiday deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 200, description = "Holiday", body = Holiday),
        (status = 404, description = "Holiday not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn get_holiday(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(find_holiday(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/holidays/date/{date}",
    params(("date" = String, Path, description = "Date (YYYY-MM-DD)")),
    responses(
        (status = 200, description = "Holiday on the date", body = Holiday),
        (status = 404, description = "No holiday on that date")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn holiday_by_date(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<NaiveDate>,
) -> actix_web::Result<impl Responder> {
    let sql = format!("SELECT {HOLIDAY_COLUMNS} FROM holidays WHERE date = ? AND deleted = 0");
    let holiday = sqlx::query_as::<_, Holiday>(&sql)
        .bind(path.into_inner())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("No holiday on that date"))?;
    Ok(HttpResponse::Ok().json(holiday))
}

#[utoipa::path(
    get,
    path = "/api/holidays/active",
    responses((status = 200, description = "Active holidays by date", body = [Holiday])),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn active_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let holidays = fetch_all::<Holiday>(
        pool.get_ref(),
        HOLIDAY_COLUMNS,
        "holidays",
        &Filter::new().raw("deleted = 0").raw("is_active = 1"),
        "date",
    )
    .await?;
    Ok(HttpResponse::Ok().json(holidays))
}

#[utoipa::path(
    get,
    path = "/api/holidays/range",
    params(HolidayRangeQuery),
    responses(
        (status = 200, description = "Holidays in the range", body = [Holiday]),
        (status = 400, description = "Invalid range")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn holidays_in_range(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HolidayRangeQuery>,
) -> actix_web::Result<impl Responder> {
    if query.end_date < query.start_date {
        return Err(AppError::bad_request("End date cannot be before start date").into());
    }
    let holidays = fetch_all::<Holiday>(
        pool.get_ref(),
        HOLIDAY_COLUMNS,
        "holidays",
        &Filter::new()
            .raw("deleted = 0")
            .and("date >= ?", query.start_date)
            .and("date <= ?", query.end_date),
        "date",
    )
    .await?;
    Ok(HttpResponse::Ok().json(holidays))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    #[test]
    fn unchanged_holiday_moves_nothing() {
        assert_eq!(attendance_moves((d(26), true), (d(26), true)), (None, None));
        assert_eq!(attendance_moves((d(26), false), (d(26), false)), (None, None));
    }

    #[test]
    fn moving_an_active_holiday_moves_attendance() {
        assert_eq!(
            attendance_moves((d(26), true), (d(27), true)),
            (Some(d(26)), Some(d(27)))
        );
    }

    #[test]
    fn toggling_active_applies_or_clears() {
        assert_eq!(attendance_moves((d(26), true), (d(26), false)), (Some(d(26)), None));
        assert_eq!(attendance_moves((d(26), false), (d(26), true)), (None, Some(d(26))));
        assert_eq!(attendance_moves((d(26), false), (d(27), false)), (None, None));
    }
}
