pub mod prelude;

pub mod audit_log;
pub mod datasets;
pub mod global_config;
pub mod queries;
pub mod users;
