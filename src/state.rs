use std::sync::Arc;

use crate::clients::livy::LivyClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::{Authenticator, LivySessionService, QueryRunner};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub authenticator: Authenticator,

    pub sessions: Arc<LivySessionService>,

    pub queries: Arc<QueryRunner>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;
        store.ensure_global_config(&config.reports.location).await?;

        let authenticator = Authenticator::from_config(&config.auth, store.clone())?;

        let livy = Arc::new(LivyClient::new(&config.livy)?);

        let sessions = Arc::new(LivySessionService::new(
            store.clone(),
            livy.clone(),
            config.livy.auto_create_session,
        ));

        let queries = Arc::new(QueryRunner::new(
            livy,
            sessions.clone(),
            &config.livy,
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            authenticator,
            sessions,
            queries,
        })
    }
}
