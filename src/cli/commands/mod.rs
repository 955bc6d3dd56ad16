mod datasets;
mod queries;
mod reports;
mod users;

pub use datasets::{cmd_dataset_add, cmd_dataset_list};
pub use queries::{cmd_query_add, cmd_query_list};
pub use reports::cmd_reports_set_location;
pub use users::{cmd_user_grant, cmd_user_history};
