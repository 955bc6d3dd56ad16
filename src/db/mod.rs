use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::audit::AuditEntry;
pub use repositories::dataset::Dataset;
pub use repositories::global_config::GlobalSettings;
pub use repositories::query::SavedQuery;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn begin(&self) -> Result<DatabaseTransaction> {
        Ok(self.conn.begin().await?)
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn dataset_repo(&self) -> repositories::dataset::DatasetRepository {
        repositories::dataset::DatasetRepository::new(self.conn.clone())
    }

    fn query_repo(&self) -> repositories::query::QueryRepository {
        repositories::query::QueryRepository::new(self.conn.clone())
    }

    fn global_config_repo(&self) -> repositories::global_config::GlobalConfigRepository {
        repositories::global_config::GlobalConfigRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_or_add_user(
        &self,
        username: &str,
        fullname: &str,
        initial_roles: &[String],
    ) -> Result<User> {
        self.user_repo()
            .get_or_create(username, fullname, initial_roles)
            .await
    }

    pub async fn verify_access_key(&self, access_key: &str) -> Result<Option<User>> {
        self.user_repo().verify_access_key(access_key).await
    }

    pub async fn regenerate_access_key(&self, username: &str) -> Result<String> {
        self.user_repo().regenerate_access_key(username).await
    }

    pub async fn grant_role(&self, username: &str, role: &str) -> Result<bool> {
        self.user_repo().grant_role(username, role).await
    }

    // ========================================================================
    // Datasets & queries
    // ========================================================================

    pub async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        self.dataset_repo().list_by_name().await
    }

    pub async fn add_dataset(
        &self,
        name: &str,
        location: &str,
        format: &str,
        description: Option<&str>,
    ) -> Result<Dataset> {
        self.dataset_repo()
            .add(name, location, format, description)
            .await
    }

    pub async fn get_query(&self, id: i32) -> Result<Option<SavedQuery>> {
        self.query_repo().get(id).await
    }

    pub async fn list_queries(&self) -> Result<Vec<SavedQuery>> {
        self.query_repo().list().await
    }

    pub async fn add_query(
        &self,
        name: &str,
        sql: &str,
        description: Option<&str>,
    ) -> Result<SavedQuery> {
        self.query_repo().add(name, sql, description).await
    }

    // ========================================================================
    // Global config
    // ========================================================================

    pub async fn ensure_global_config(&self, reports_location: &str) -> Result<GlobalSettings> {
        self.global_config_repo().ensure(reports_location).await
    }

    pub async fn global_config(&self) -> Result<GlobalSettings> {
        self.global_config_repo()
            .get()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Global config has not been initialized"))
    }

    pub async fn set_reports_location(&self, location: &str) -> Result<()> {
        self.global_config_repo()
            .set_reports_location(location)
            .await
    }

    // ========================================================================
    // Audit
    // ========================================================================

    pub async fn log_action(&self, username: &str, action: &str, details: Option<&str>) -> Result<()> {
        self.audit_repo().add(username, action, details).await
    }

    pub async fn recent_actions(&self, username: &str, limit: u64) -> Result<Vec<AuditEntry>> {
        self.audit_repo().recent_for_user(username, limit).await
    }
}
