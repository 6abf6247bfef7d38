pub mod db_utils;
pub mod identity;
pub mod identity_cache;
pub mod identity_filter;
pub mod pagination;
pub mod query_filter;
pub mod scheduler;
pub mod site_cache;
