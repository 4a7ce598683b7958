pub mod create_script;
pub mod materialized_views;
pub mod updates;
pub mod versioning;
