pub use super::audit_log::Entity as AuditLog;
pub use super::datasets::Entity as Datasets;
pub use super::global_config::Entity as GlobalConfig;
pub use super::queries::Entity as Queries;
pub use super::users::Entity as Users;
