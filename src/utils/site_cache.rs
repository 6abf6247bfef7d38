//! Active sites are read on every GPS punch; keep them in memory for a
//! few minutes and drop them whenever a site changes.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;

use crate::error::AppResult;
use crate::model::site::{SITE_COLUMNS, Site};

const ACTIVE_KEY: &str = "active";

static SITES: Lazy<Cache<&'static str, Arc<Vec<Site>>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(4)
        .time_to_live(Duration::from_secs(300))
        .build()
});

pub async fn active_sites(pool: &MySqlPool) -> AppResult<Arc<Vec<Site>>> {
    if let Some(sites) = SITES.get(ACTIVE_KEY).await {
        return Ok(sites);
    }

    let sql = format!(
        "SELECT {SITE_COLUMNS} FROM sites WHERE is_active = 1 AND deleted = 0 ORDER BY site_name"
    );
    let sites = Arc::new(sqlx::query_as::<_, Site>(&sql).fetch_all(pool).await?);
    SITES.insert(ACTIVE_KEY, sites.clone()).await;
    tracing::debug!(count = sites.len(), "Active sites cached");
    Ok(sites)
}

pub async fn invalidate() {
    SITES.invalidate(ACTIVE_KEY).await;
}
