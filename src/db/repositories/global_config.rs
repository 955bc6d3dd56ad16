use crate::constants::GLOBAL_CONFIG_ID;
use crate::entities::{global_config, prelude::*};
use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Set};

pub type GlobalSettings = global_config::Model;

pub struct GlobalConfigRepository {
    conn: DatabaseConnection,
}

impl GlobalConfigRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert the singleton row if it does not exist yet.
    pub async fn ensure(&self, reports_location: &str) -> Result<GlobalSettings> {
        if let Some(existing) = self.get().await? {
            return Ok(existing);
        }

        let active = global_config::ActiveModel {
            id: Set(GLOBAL_CONFIG_ID),
            reports_location: Set(reports_location.to_string()),
            livy_session_id: Set(None),
            livy_session_state: Set(None),
            livy_session_updated_at: Set(None),
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to seed global config")
    }

    pub async fn get(&self) -> Result<Option<GlobalSettings>> {
        Self::get_with(&self.conn).await
    }

    /// Read the row through any connection, including an open transaction.
    pub async fn get_with<C: ConnectionTrait>(conn: &C) -> Result<Option<GlobalSettings>> {
        GlobalConfig::find_by_id(GLOBAL_CONFIG_ID)
            .one(conn)
            .await
            .context("Failed to load global config")
    }

    pub async fn set_reports_location(&self, location: &str) -> Result<()> {
        let row = self
            .get()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Global config row missing"))?;

        let mut active: global_config::ActiveModel = row.into();
        active.reports_location = Set(location.to_string());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_livy_session_with<C: ConnectionTrait>(
        conn: &C,
        row: GlobalSettings,
        session_id: Option<i64>,
        state: Option<String>,
    ) -> Result<GlobalSettings> {
        let mut active: global_config::ActiveModel = row.into();
        active.livy_session_id = Set(session_id);
        active.livy_session_state = Set(state);
        active.livy_session_updated_at = Set(Some(chrono::Utc::now().to_rfc3339()));

        active
            .update(conn)
            .await
            .context("Failed to store Livy session status")
    }
}
