use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::notification::{NOTIFICATION_COLUMNS, Notification, NotificationResponse},
    utils::{
        pagination::{Page, PageQuery},
        query_filter::{Filter, fetch_all, fetch_page},
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PushTokenRequest {
    pub token: String,
}

async fn owned_notification(
    pool: &MySqlPool,
    auth: &AuthUser,
    notification_id: u64,
) -> AppResult<Notification> {
    let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ? AND deleted = 0");
    let notification = sqlx::query_as::<_, Notification>(&sql)
        .bind(notification_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Notification not found"))?;
    if notification.user_id != auth.user_id {
        return Err(AppError::forbidden("You can only access your own notifications"));
    }
    Ok(notification)
}

fn mine(auth: &AuthUser) -> Filter {
    Filter::new()
        .and("user_id = ?", auth.user_id)
        .raw("deleted = 0")
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(PageQuery),
    responses((status = 200, description = "My notifications, newest first (data, page, per_page, total)", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn my_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PageQuery>,
) -> actix_web::Result<impl Responder> {
    let page: Page<Notification> = fetch_page(
        pool.get_ref(),
        NOTIFICATION_COLUMNS,
        "notifications",
        &mine(&auth),
        "created_at DESC, id DESC",
        &query,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page.map(NotificationResponse::from)))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread",
    responses((status = 200, description = "Unread notifications", body = [NotificationResponse])),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn unread_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let rows = fetch_all::<Notification>(
        pool.get_ref(),
        NOTIFICATION_COLUMNS,
        "notifications",
        &mine(&auth).raw("is_read = 0"),
        "created_at DESC, id DESC",
    )
    .await?;
    let body: Vec<NotificationResponse> = rows.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread/count",
    responses((status = 200, description = "Unread count", body = Object, example = json!({"count": 3}))),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn unread_count(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND deleted = 0 AND is_read = 0",
    )
    .bind(auth.user_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(json!({ "count": count })))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{notification_id}/read",
    params(("notification_id" = u64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked as read", body = NotificationResponse),
        (status = 403, description = "Not my notification"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let pool = pool.get_ref();
    let mut notification = owned_notification(pool, &auth, path.into_inner()).await?;
    if !notification.is_read {
        let now = Local::now().naive_local();
        sqlx::query("UPDATE notifications SET is_read = 1, read_at = ? WHERE id = ?")
            .bind(now)
            .bind(notification.id)
            .execute(pool)
            .await
            .map_err(AppError::from)?;
        notification.is_read = true;
        notification.read_at = Some(now);
    }
    Ok(HttpResponse::Ok().json(NotificationResponse::from(notification)))
}

#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    responses((status = 200, description = "All marked as read", body = Object, example = json!({"message": "All notifications marked as read", "updated": 4}))),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_all_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let updated = sqlx::query(
        "UPDATE notifications SET is_read = 1, read_at = ? WHERE user_id = ? AND deleted = 0 AND is_read = 0",
    )
    .bind(Local::now().naive_local())
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(AppError::from)?
    .rows_affected();
    debug!(user_id = auth.user_id, updated, "Notifications marked as read");
    Ok(HttpResponse::Ok().json(json!({
        "message": "All notifications marked as read",
        "updated": updated
    })))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{notification_id}",
    params(("notification_id" = u64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification deleted", body = Object, example = json!({"message": "Notification deleted"})),
        (status = 403, description = "Not my notification")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn delete_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let notification = owned_notification(pool.get_ref(), &auth, path.into_inner()).await?;
    sqlx::query("UPDATE notifications SET deleted = 1 WHERE id = ?")
        .bind(notification.id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Notification deleted" })))
}

#[utoipa::path(
    post,
    path = "/api/notifications/push-token",
    request_body = PushTokenRequest,
    responses(
        (status = 200, description = "Push token registered", body = Object, example = json!({"message": "Push token registered"})),
        (status = 400, description = "Empty token")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn register_push_token(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PushTokenRequest>,
) -> actix_web::Result<impl Responder> {
    let token = payload.token.trim();
    if token.is_empty() {
        return Err(AppError::bad_request("Token is required").into());
    }
    sqlx::query("UPDATE users SET fcm_token = ? WHERE id = ?")
        .bind(token)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    info!(user_id = auth.user_id, "Push token registered");
    Ok(HttpResponse::Ok().json(json!({ "message": "Push token registered" })))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/push-token",
    responses((status = 200, description = "Push token removed", body = Object, example = json!({"message": "Push token removed"}))),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn remove_push_token(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    sqlx::query("UPDATE users SET fcm_token = NULL WHERE id = ?")
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    info!(user_id = auth.user_id, "Push token removed");
    Ok(HttpResponse::Ok().json(json!({ "message": "Push token removed" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    #[test]
    fn my_filter_scopes_to_user_and_live_rows() {
        let auth = AuthUser {
            user_id: 9,
            username: "ravi".into(),
            role: Role::Employee,
            employee_id: None,
        };
        let f = mine(&auth).raw("is_read = 0");
        assert_eq!(f.where_clause(), "WHERE user_id = ? AND deleted = 0 AND is_read = 0");
    }
}
