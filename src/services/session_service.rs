//! Tracking of the shared Livy compute session.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::clients::livy::{LivyClient, LivySession};
use crate::db::repositories::global_config::GlobalConfigRepository;
use crate::db::{GlobalSettings, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub session_id: Option<i64>,
    pub state: Option<String>,
    pub updated_at: Option<String>,
}

impl From<GlobalSettings> for SessionStatus {
    fn from(row: GlobalSettings) -> Self {
        Self {
            session_id: row.livy_session_id,
            state: row.livy_session_state,
            updated_at: row.livy_session_updated_at,
        }
    }
}

pub struct LivySessionService {
    store: Store,
    livy: Arc<LivyClient>,
    auto_create: bool,
}

impl LivySessionService {
    #[must_use]
    pub const fn new(store: Store, livy: Arc<LivyClient>, auto_create: bool) -> Self {
        Self {
            store,
            livy,
            auto_create,
        }
    }

    /// Last recorded status, without contacting Livy.
    pub async fn current(&self) -> Result<SessionStatus> {
        Ok(self.store.global_config().await?.into())
    }

    /// Refresh the tracked session from Livy, replacing it when it is gone
    /// or finished. The database change is only committed once every Livy
    /// call has succeeded.
    pub async fn update_session_status(&self) -> Result<SessionStatus> {
        let txn = self.store.begin().await?;

        let row = GlobalConfigRepository::get_with(&txn)
            .await?
            .context("Global config has not been initialized")?;

        let tracked = match row.livy_session_id {
            Some(id) => self.livy.get_session(id).await?,
            None => None,
        };

        let session = match tracked {
            Some(session) if session.state.is_alive() => Some(session),
            other if self.auto_create => {
                if let Some(stale) = &other {
                    info!(session_id = stale.id, state = %stale.state, "Replacing finished Livy session");
                }
                Some(self.livy.create_session().await?)
            }
            other => other,
        };

        let updated = GlobalConfigRepository::set_livy_session_with(
            &txn,
            row,
            session.as_ref().map(|s| s.id),
            session.as_ref().map(|s| s.state.to_string()),
        )
        .await?;

        txn.commit()
            .await
            .context("Failed to commit Livy session status")?;

        Ok(updated.into())
    }

    /// The tracked session, provided Livy still reports it as usable.
    pub async fn active_session(&self) -> Result<Option<LivySession>> {
        let Some(id) = self.store.global_config().await?.livy_session_id else {
            return Ok(None);
        };

        let session = self.livy.get_session(id).await?;
        Ok(session.filter(|s| s.state.is_alive()))
    }
}
