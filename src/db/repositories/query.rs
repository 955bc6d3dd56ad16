use crate::entities::{prelude::*, queries};
use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};

pub type SavedQuery = queries::Model;

pub struct QueryRepository {
    conn: DatabaseConnection,
}

impl QueryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<SavedQuery>> {
        Queries::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query saved query")
    }

    pub async fn list(&self) -> Result<Vec<SavedQuery>> {
        Queries::find()
            .order_by_asc(queries::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list queries")
    }

    pub async fn add(&self, name: &str, sql: &str, description: Option<&str>) -> Result<SavedQuery> {
        let active = queries::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description.map(ToString::to_string)),
            sql: Set(sql.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .with_context(|| format!("Failed to add query {name}"))
    }
}
