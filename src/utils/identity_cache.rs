//! Positive cache of recently seen identities.

use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

use super::identity::IdentityKind;

static TAKEN: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000)
        .time_to_live(Duration::from_secs(86_400))
        .build()
});

pub async fn mark_taken(kind: IdentityKind, value: &str) {
    TAKEN.insert(kind.key(value), ()).await;
}

pub async fn is_taken(kind: IdentityKind, value: &str) -> bool {
    TAKEN.get(&kind.key(value)).await.is_some()
}

/// Loads usernames of users who logged in within the last `days`.
pub async fn warmup_recent_users(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_scalar::<_, String>(
        r#"
        SELECT username
        FROM users
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        ORDER BY last_login_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        batch.push(row?);
        total += 1;

        if batch.len() >= batch_size {
            mark_batch(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        mark_batch(&batch).await;
    }

    log::info!(
        "Identity cache warmup complete: {} recent users (last {} days)",
        total,
        days
    );
    Ok(())
}

async fn mark_batch(usernames: &[String]) {
    let inserts: Vec<_> = usernames
        .iter()
        .map(|u| TAKEN.insert(IdentityKind::Username.key(u), ()))
        .collect();
    futures::future::join_all(inserts).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn marks_are_case_insensitive_per_kind() {
        mark_taken(IdentityKind::Username, "Cache.Test.User").await;
        assert!(is_taken(IdentityKind::Username, "cache.test.user").await);
        assert!(!is_taken(IdentityKind::EmployeeCode, "cache.test.user").await);
    }
}
