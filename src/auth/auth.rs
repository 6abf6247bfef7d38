use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, http::header::HeaderMap, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

/// Reads and validates the bearer access token.
pub fn authenticate(headers: &HeaderMap, config: &Config) -> AppResult<AuthUser> {
    let header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding".into()))?;

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Authorization header must start with Bearer".into())
    })?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    if claims.token_type != TokenType::Access {
        return Err(AppError::Unauthorized("Access token required".into()));
    }

    let role = Role::from_id(claims.role)
        .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        employee_id: claims.employee_id,
    })
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by auth_middleware on protected routes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let result = match req.app_data::<Data<Config>>() {
            Some(config) => authenticate(req.headers(), config),
            None => {
                tracing::error!("Config missing from app data");
                Err(AppError::Internal)
            }
        };
        ready(result.map_err(Into::into))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> AppResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> AppResult<()> {
        if self.role.is_hr_or_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("HR/Admin only"))
        }
    }

    pub fn is_manager(&self) -> bool {
        self.role.is_hr_or_admin()
    }

    /// The linked employee id, required by self-service operations.
    pub fn require_employee(&self) -> AppResult<u64> {
        self.employee_id
            .ok_or_else(|| AppError::forbidden("No employee profile is linked to this account"))
    }

    /// HR/Admin see everyone, employees only themselves.
    pub fn can_view_employee(&self, employee_id: u64) -> bool {
        self.is_manager() || self.employee_id == Some(employee_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_access_token, generate_refresh_token};
    use crate::config::test_config;
    use actix_web::http::header::{AUTHORIZATION, HeaderValue};

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn subject() -> TokenSubject<'static> {
        TokenSubject {
            user_id: 1,
            username: "hr.lead",
            role: Role::Hr.id(),
            employee_id: None,
        }
    }

    #[test]
    fn accepts_access_token() {
        let config = test_config();
        let token = generate_access_token(subject(), &config.jwt_secret, 60).unwrap();
        let user = authenticate(&headers_with(&format!("Bearer {token}")), &config).unwrap();
        assert_eq!(user.role, Role::Hr);
        assert!(user.is_manager());
        assert!(user.require_employee().is_err());
    }

    #[test]
    fn rejects_refresh_token_and_bad_scheme() {
        let config = test_config();
        let (token, _) = generate_refresh_token(subject(), &config.jwt_secret, 60).unwrap();
        assert!(authenticate(&headers_with(&format!("Bearer {token}")), &config).is_err());
        assert!(authenticate(&headers_with("Basic abc"), &config).is_err());
        assert!(authenticate(&HeaderMap::new(), &config).is_err());
    }

    #[test]
    fn employees_only_view_themselves() {
        let user = AuthUser {
            user_id: 9,
            username: "asha".into(),
            role: Role::Employee,
            employee_id: Some(7),
        };
        assert!(user.can_view_employee(7));
        assert!(!user.can_view_employee(8));
        assert!(user.require_hr_or_admin().is_err());
        assert_eq!(user.require_employee().unwrap(), 7);
    }
}
