use crate::entities::{audit_log, prelude::*};
use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

pub type AuditEntry = audit_log::Model;

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(&self, username: &str, action: &str, details: Option<&str>) -> Result<()> {
        let active_model = audit_log::ActiveModel {
            username: Set(username.to_string()),
            action: Set(action.to_string()),
            details: Set(details.map(ToString::to_string)),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        AuditLog::insert(active_model).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn recent_for_user(&self, username: &str, limit: u64) -> Result<Vec<AuditEntry>> {
        let entries = AuditLog::find()
            .filter(audit_log::Column::Username.eq(username))
            .order_by_desc(audit_log::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(entries)
    }
}
