use crate::{
    auth::{
        auth::AuthUser,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult, is_duplicate_key},
    model::{
        role::Role,
        user::{USER_COLUMNS, User},
    },
    models::{Claims, LoginReqDto, RegisterReq, TokenPair, TokenType},
    utils::identity::{self, IdentityKind},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

/// Inserts a user after an availability check and records the username in
/// the identity filter and cache.
pub async fn create_user(
    pool: &MySqlPool,
    username: &str,
    password: &str,
    role: Role,
    employee_id: Option<u64>,
) -> AppResult<u64> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::bad_request(
            "Username and password must not be empty",
        ));
    }

    if !identity::is_available(pool, IdentityKind::Username, username).await {
        return Err(AppError::conflict("Username already taken"));
    }

    let hashed = hash_password(password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        AppError::Internal
    })?;

    let result = sqlx::query(
        "INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(hashed)
    .bind(role.id())
    .bind(employee_id)
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            identity::remember(IdentityKind::Username, username).await;
            Ok(done.last_insert_id())
        }
        Err(e) if is_duplicate_key(&e) => Err(AppError::conflict("Username already exists")),
        Err(e) => Err(e.into()),
    }
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    error!(error = %e, "Token signing failed");
    AppError::Internal
}

async fn store_refresh(pool: &MySqlPool, user_id: u64, claims: &Claims) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

async fn issue_tokens(
    pool: &MySqlPool,
    config: &Config,
    subject: TokenSubject<'_>,
) -> AppResult<TokenPair> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(token_error)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh(pool, subject.user_id, &refresh_claims).await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// The revoke is conditional on `revoked = 0`; only the request that flipped
/// it may issue the next pair.
fn claim_rotation(rows_affected: u64) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::Unauthorized("Invalid refresh token".into()));
    }
    Ok(())
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Self-registration. The account gets the EMPLOYEE role and no linked
/// employee; HR links profiles through employee credentials.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered"),
        (status = 400, description = "Missing username or password"),
        (status = 409, description = "Username taken")
    ),
    tag = "Auth"
)]
pub async fn register(
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let user_id = create_user(
        pool.get_ref(),
        &user.username,
        &user.password,
        Role::Employee,
        None,
    )
    .await?;

    info!(user_id, "User registered");
    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user_id": user_id
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(AppError::bad_request("Username or password required").into());
    }

    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
    let db_user = sqlx::query_as::<_, User>(&sql)
        .bind(user.username.trim())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(AppError::from)?;

    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Login refused: account disabled");
            return Err(invalid().into());
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(invalid().into());
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid().into());
    }

    let tokens = issue_tokens(
        pool.get_ref(),
        &config,
        TokenSubject {
            user_id: db_user.id,
            username: &db_user.username,
            role: db_user.role_id,
            employee_id: db_user.employee_id,
        },
    )
    .await?;

    // Not fatal for the login itself.
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotates the refresh token sent as bearer and issues a new pair with the
/// user's current role and employee link.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, revoked or expired")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let unauthorized = || AppError::Unauthorized("Invalid refresh token".into());

    let token = bearer(&req).ok_or_else(unauthorized)?;
    let claims = verify_token(token, &config.jwt_secret).map_err(|_| unauthorized())?;
    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized().into());
    }

    let record = sqlx::query_as::<_, (u64, u64, bool)>(
        "SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ?",
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(AppError::from)?;

    let (record_id, user_id) = match record {
        Some((id, user_id, false)) => (id, user_id),
        _ => return Err(unauthorized().into()),
    };

    let revoked = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
        .bind(record_id)
        .execute(pool.get_ref())
        .await
        .map_err(AppError::from)?;
    claim_rotation(revoked.rows_affected())?;

    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let db_user = sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(AppError::from)?
        .filter(|u| u.is_active)
        .ok_or_else(unauthorized)?;

    let tokens = issue_tokens(
        pool.get_ref(),
        &config,
        TokenSubject {
            user_id: db_user.id,
            username: &db_user.username,
            role: db_user.role_id,
            employee_id: db_user.employee_id,
        },
    )
    .await?;

    debug!(user_id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Revokes the refresh token sent as bearer. Always answers 204.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let claims = bearer(&req).and_then(|t| verify_token(t, &config.jwt_secret).ok());

    if let Some(claims) = claims.filter(|c| c.token_type == TokenType::Refresh) {
        if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
            .bind(&claims.jti)
            .execute(pool.get_ref())
            .await
        {
            error!(error = %e, "Failed to revoke refresh token");
        }
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "Current user")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "user_id": auth.user_id,
        "username": auth.username,
        "role": auth.role,
        "employee_id": auth.employee_id
    }))
}

/// Creates the configured admin account once.
pub async fn ensure_bootstrap_admin(pool: &MySqlPool, config: &Config) -> anyhow::Result<()> {
    let Some((username, password)) = &config.bootstrap_admin else {
        return Ok(());
    };

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)",
    )
    .bind(username)
    .fetch_one(pool)
    .await?;
    if exists {
        debug!(%username, "Bootstrap admin already present");
        return Ok(());
    }

    create_user(pool, username, password, Role::Admin, None)
        .await
        .map_err(|e| anyhow::anyhow!("bootstrap admin: {e}"))?;
    info!(%username, "Bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{ResponseError, http::StatusCode, test::TestRequest};

    #[test]
    fn second_rotation_of_a_token_is_unauthorized() {
        assert!(claim_rotation(1).is_ok());
        let err = claim_rotation(0).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn bearer_needs_the_scheme_prefix() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer(&req), Some("abc.def"));

        let req = TestRequest::default()
            .insert_header(("Authorization", "abc.def"))
            .to_http_request();
        assert_eq!(bearer(&req), None);
    }
}
