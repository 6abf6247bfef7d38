use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::broadcast::{BROADCAST_COLUMNS, BroadcastMessage, BroadcastPriority},
    service::notify::{self, Notice},
    utils::{
        pagination::PageQuery,
        query_filter::{Filter, fetch_all, fetch_page},
    },
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    #[schema(example = "Site closed on Friday")]
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: BroadcastPriority,
    pub is_active: Option<bool>,
}

/// Trimmed `(title, message)`; both are required.
pub fn clean_broadcast(req: &BroadcastRequest) -> AppResult<(String, String)> {
    let title = req.title.trim();
    let message = req.message.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }
    if message.is_empty() {
        return Err(AppError::bad_request("Message is required"));
    }
    Ok((title.to_string(), message.to_string()))
}

async fn find_broadcast(pool: &MySqlPool, broadcast_id: u64) -> AppResult<BroadcastMessage> {
    let sql = format!("SELECT {BROADCAST_COLUMNS} FROM broadcast_messages WHERE id = ? AND deleted = 0");
    sqlx::query_as::<_, BroadcastMessage>(&sql)
        .bind(broadcast_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Broadcast message not found"))
}

/// Fans the message out to every active employee in the background.
fn announce(pool: &MySqlPool, broadcast: &BroadcastMessage) {
    let pool = pool.clone();
    let priority = broadcast
        .priority
        .parse::<BroadcastPriority>()
        .unwrap_or_default();
    let notice = Notice::broadcast(broadcast.id, &broadcast.title, &broadcast.message, priority);
    let broadcast_id = broadcast.id;
    actix_web::rt::spawn(async move {
        match notify::active_employee_user_ids(&pool).await {
            Ok(users) => {
                let sent = notify::fan_out(&pool, &users, &notice).await;
                info!(broadcast_id, sent, "Broadcast delivered");
            }
            Err(e) => warn!(broadcast_id, error = %e, "Could not load broadcast recipients"),
        }
    });
}

#[utoipa::path(
    post,
    path = "/api/broadcasts",
    request_body = BroadcastRequest,
    responses(
        (status = 201, description = "Broadcast created", body = BroadcastMessage),
        (status = 400, description = "Missing title or message")
    ),
    security(("bearer_auth" = [])),
    tag = "Broadcast"
)]
pub async fn create_broadcast(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<BroadcastRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let (title, message) = clean_broadcast(&payload)?;
    let is_active = payload.is_active.unwrap_or(true);

    let broadcast_id = sqlx::query(
        "INSERT INTO broadcast_messages (title, message, priority, is_active, created_by) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&title)
    .bind(&message)
    .bind(payload.priority.as_ref())
    .bind(is_active)
    .bind(auth.user_id)
    .execute(pool)
    .await
    .map_err(AppError::from)?
    .last_insert_id();

    let broadcast = find_broadcast(pool, broadcast_id).await?;
    if broadcast.is_active {
        announce(pool, &broadcast);
    }
    info!(broadcast_id, priority = %payload.priority, "Broadcast created");
    Ok(HttpResponse::Created().json(broadcast))
}

#[utoipa::path(
    put,
    path = "/api/broadcasts/{broadcast_id}",
    params(("broadcast_id" = u64, Path, description = "Broadcast ID")),
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Broadcast updated", body = BroadcastMessage),
        (status = 404, description = "Broadcast not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Broadcast"
)]
pub async fn update_broadcast(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<BroadcastRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let current = find_broadcast(pool, path.into_inner()).await?;
    let (title, message) = clean_broadcast(&payload)?;
    let is_active = payload.is_active.unwrap_or(current.is_active);

    sqlx::query(
        "UPDATE broadcast_messages SET title = ?, message = ?, priority = ?, is_active = ?, updated_by = ? WHERE id = ?",
    )
    .bind(&title)
    .bind(&message)
    .bind(payload.priority.as_ref())
    .bind(is_active)
    .bind(auth.user_id)
    .bind(current.id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;

    let updated = find_broadcast(pool, current.id).await?;
    if !current.is_active && updated.is_active {
        announce(pool, &updated);
    }
    info!(broadcast_id = current.id, "Broadcast updated");
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/broadcasts/{broadcast_id}",
    params(("broadcast_id" = u64, Path, description = "Broadcast ID")),
    responses(
        (status = 200, description = "Broadcast deleted", body = Object, example = json!({"message": "Broadcast deleted"})),
        (status = 404, description = "Broadcast not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Broadcast"
)]
pub async fn delete_broadcast(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let broadcast = find_broadcast(pool.get_ref(), path.into_inner()).await?;
    sqlx::query("UPDATE broadcast_messages SET deleted = 1, updated_by = ? WHERE id = ?")
        .bind(auth.user_id)
        .bind(broadcast.id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    info!(broadcast_id = broadcast.id, "Broadcast deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Broadcast deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/broadcasts",
    params(PageQuery),
    responses((status = 200, description = "Paginated broadcasts (data, page, per_page, total)", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Broadcast"
)]
pub async fn list_broadcasts(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PageQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let page = fetch_page::<BroadcastMessage>(
        pool.get_ref(),
        BROADCAST_COLUMNS,
        "broadcast_messages",
        &Filter::new().raw("deleted = 0"),
        "created_at DESC",
        &query,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/broadcasts/active",
    responses((status = 200, description = "Active broadcasts, newest first", body = [BroadcastMessage])),
    security(("bearer_auth" = [])),
    tag = "Broadcast"
)]
pub async fn active_broadcasts(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let rows = fetch_all::<BroadcastMessage>(
        pool.get_ref(),
        BROADCAST_COLUMNS,
        "broadcast_messages",
        &Filter::new().raw("deleted = 0").raw("is_active = 1"),
        "created_at DESC",
    )
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/broadcasts/{broadcast_id}",
    params(("broadcast_id" = u64, Path, description = "Broadcast ID")),
    responses(
        (status = 200, description = "Broadcast", body = BroadcastMessage),
        (status = 404, description = "Broadcast not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Broadcast"
)]
pub async fn get_broadcast(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let broadcast = find_broadcast(pool.get_ref(), path.into_inner()).await?;
    // inactive messages are hidden from employees
    if !broadcast.is_active && !auth.is_manager() {
        return Err(AppError::not_found("Broadcast message not found").into());
    }
    Ok(HttpResponse::Ok().json(broadcast))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_message_are_trimmed_and_required() {
        let req: BroadcastRequest = serde_json::from_value(json!({
            "title": "  Holiday  ",
            "message": " Office closed "
        }))
        .unwrap();
        assert_eq!(req.priority, BroadcastPriority::Normal);
        assert_eq!(
            clean_broadcast(&req).unwrap(),
            ("Holiday".to_string(), "Office closed".to_string())
        );

        let blank: BroadcastRequest = serde_json::from_value(json!({
            "title": "Holiday",
            "message": "   ",
            "priority": "URGENT"
        }))
        .unwrap();
        assert_eq!(blank.priority, BroadcastPriority::Urgent);
        assert_eq!(clean_broadcast(&blank).unwrap_err().to_string(), "Message is required");
    }
}
