use crate::entities::{datasets, prelude::*};
use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};

pub type Dataset = datasets::Model;

pub struct DatasetRepository {
    conn: DatabaseConnection,
}

impl DatasetRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_by_name(&self) -> Result<Vec<Dataset>> {
        Datasets::find()
            .order_by_asc(datasets::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list datasets")
    }

    pub async fn add(
        &self,
        name: &str,
        location: &str,
        format: &str,
        description: Option<&str>,
    ) -> Result<Dataset> {
        let active = datasets::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description.map(ToString::to_string)),
            location: Set(location.to_string()),
            format: Set(format.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .with_context(|| format!("Failed to add dataset {name}"))
    }
}
