pub mod audit;
pub mod dataset;
pub mod global_config;
pub mod query;
pub mod user;
