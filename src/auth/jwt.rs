use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

/// Who a token is issued for.
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub user_id: u64,
    pub username: &'a str,
    pub role: u8,
    pub employee_id: Option<u64>,
}

impl<'a> From<&'a Claims> for TokenSubject<'a> {
    fn from(c: &'a Claims) -> Self {
        Self {
            user_id: c.user_id,
            username: &c.sub,
            role: c.role,
            employee_id: c.employee_id,
        }
    }
}

fn now() -> usize {
    chrono::Utc::now().timestamp().max(0) as usize
}

fn claims_for(subject: TokenSubject<'_>, token_type: TokenType, ttl: usize) -> Claims {
    Claims {
        user_id: subject.user_id,
        sub: subject.username.to_string(),
        role: subject.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        employee_id: subject.employee_id,
    }
}

fn sign(claims: &Claims, secret: &str) -> Result<String, Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_access_token(
    subject: TokenSubject<'_>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    sign(&claims_for(subject, TokenType::Access, ttl), secret)
}

/// Returns the claims too; the `jti` has to be persisted.
pub fn generate_refresh_token(
    subject: TokenSubject<'_>,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = claims_for(subject, TokenType::Refresh, ttl);
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBJECT: TokenSubject<'static> = TokenSubject {
        user_id: 42,
        username: "ravi.kumar",
        role: 3,
        employee_id: Some(7),
    };

    #[test]
    fn access_token_round_trip() {
        let token = generate_access_token(SUBJECT, "s3cret", 900).unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.sub, "ravi.kumar");
        assert_eq!(claims.employee_id, Some(7));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn refresh_tokens_carry_unique_jti() {
        let (t1, c1) = generate_refresh_token(SUBJECT, "s3cret", 60).unwrap();
        let (_, c2) = generate_refresh_token(SUBJECT, "s3cret", 60).unwrap();
        assert_ne!(c1.jti, c2.jti);
        assert_eq!(verify_token(&t1, "s3cret").unwrap().token_type, TokenType::Refresh);
    }

    #[test]
    fn wrong_secret_and_expired_tokens_fail() {
        let token = generate_access_token(SUBJECT, "s3cret", 900).unwrap();
        assert!(verify_token(&token, "other").is_err());

        let mut expired = claims_for(SUBJECT, TokenType::Access, 0);
        expired.exp = now() - 3600;
        let token = sign(&expired, "s3cret").unwrap();
        assert!(verify_token(&token, "s3cret").is_err());
    }
}
