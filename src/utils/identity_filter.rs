//! Cuckoo filter over taken identities (usernames, employee codes).
//! A miss means the value is definitely free; a hit still needs a lookup.

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::{PoisonError, RwLock};

use super::identity::IdentityKind;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static IDENTITY_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

pub fn might_exist(kind: IdentityKind, value: &str) -> bool {
    IDENTITY_FILTER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&kind.key(value))
}

pub fn insert(kind: IdentityKind, value: &str) {
    IDENTITY_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .add(&kind.key(value));
}

/// Streams every stored value of `kind` into the filter in batches.
pub async fn warmup(pool: &MySqlPool, kind: IdentityKind, batch_size: usize) -> Result<()> {
    let sql = format!("SELECT {} FROM {}", kind.column(), kind.table());
    let mut stream = sqlx::query_scalar::<_, String>(&sql).fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let value = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;
        batch.push(kind.key(&value));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    log::info!("Identity filter warmup complete: {} {:?} values", total, kind);
    Ok(())
}

fn insert_batch(keys: &[String]) {
    let mut filter = IDENTITY_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    for key in keys {
        filter.add(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_do_not_collide() {
        insert(IdentityKind::EmployeeCode, "filter-test-emp-001");
        assert!(might_exist(IdentityKind::EmployeeCode, "FILTER-TEST-EMP-001"));
        assert!(!might_exist(IdentityKind::Username, "zz-never-inserted-username"));
    }
}
