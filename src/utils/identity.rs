//! Availability checks for unique identities: filter for fast negatives,
//! cache for fast positives, database as the final word.

use sqlx::MySqlPool;

use super::{identity_cache, identity_filter};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IdentityKind {
    Username,
    EmployeeCode,
}

impl IdentityKind {
    pub fn table(self) -> &'static str {
        match self {
            IdentityKind::Username => "users",
            IdentityKind::EmployeeCode => "employees",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            IdentityKind::Username => "username",
            IdentityKind::EmployeeCode => "employee_code",
        }
    }

    /// Case-insensitive key, namespaced per kind.
    pub fn key(self, value: &str) -> String {
        let prefix = match self {
            IdentityKind::Username => "u",
            IdentityKind::EmployeeCode => "e",
        };
        format!("{prefix}:{}", value.trim().to_lowercase())
    }
}

/// true  => value AVAILABLE
/// false => value TAKEN (or the lookup failed)
pub async fn is_available(pool: &MySqlPool, kind: IdentityKind, value: &str) -> bool {
    if !identity_filter::might_exist(kind, value) {
        return true;
    }

    if identity_cache::is_taken(kind, value).await {
        return false;
    }

    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ? LIMIT 1)",
        kind.table(),
        kind.column()
    );
    let exists = sqlx::query_scalar::<_, bool>(&sql)
        .bind(value.trim())
        .fetch_one(pool)
        .await
        .unwrap_or(true);

    if exists {
        identity_cache::mark_taken(kind, value).await;
    }
    !exists
}

/// Record a value that was just stored.
pub async fn remember(kind: IdentityKind, value: &str) {
    identity_filter::insert(kind, value);
    identity_cache::mark_taken(kind, value).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_and_case_folded() {
        assert_eq!(IdentityKind::Username.key(" Ravi.K "), "u:ravi.k");
        assert_eq!(IdentityKind::EmployeeCode.key("EMP-001"), "e:emp-001");
    }
}
