use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::OnConflict,
};

use crate::entities::users;

/// Local user record as seen by the web layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub fullname: String,
    pub access_key: Option<String>,
    pub roles: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            fullname: model.fullname,
            access_key: model.access_key,
            roles: split_roles(&model.roles),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn split_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn join_roles(roles: &[String]) -> String {
    let mut unique: Vec<&str> = Vec::with_capacity(roles.len());
    for role in roles {
        let role = role.trim();
        if !role.is_empty() && !unique.contains(&role) {
            unique.push(role);
        }
    }
    unique.join(",")
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn find_model(&self, username: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.find_model(username).await?.map(User::from))
    }

    /// Return the existing user or create it. An existing user's display
    /// name and roles are left untouched.
    pub async fn get_or_create(
        &self,
        username: &str,
        fullname: &str,
        initial_roles: &[String],
    ) -> Result<User> {
        if let Some(existing) = self.find_model(username).await? {
            return Ok(User::from(existing));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let active = users::ActiveModel {
            username: Set(username.to_string()),
            fullname: Set(fullname.to_string()),
            access_key: Set(None),
            roles: Set(join_roles(initial_roles)),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        // Concurrent first logins race on the unique username; the loser
        // inserts nothing and reads the winner's row.
        let inserted = users::Entity::insert(active)
            .on_conflict(
                OnConflict::column(users::Column::Username)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .with_context(|| format!("Failed to create user {username}"))?;

        if inserted > 0 {
            tracing::info!(username, "Provisioned new local user");
        }

        let model = self
            .find_model(username)
            .await?
            .with_context(|| format!("User {username} missing after insert"))?;

        Ok(User::from(model))
    }

    /// Verify access key and return the associated user
    pub async fn verify_access_key(&self, access_key: &str) -> Result<Option<User>> {
        if access_key.is_empty() {
            return Ok(None);
        }

        let user = users::Entity::find()
            .filter(users::Column::AccessKey.eq(access_key))
            .one(&self.conn)
            .await
            .context("Failed to query user by access key")?;

        Ok(user.map(User::from))
    }

    /// Regenerate access key for a user
    pub async fn regenerate_access_key(&self, username: &str) -> Result<String> {
        let user = self
            .find_model(username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {username}"))?;

        let new_key = generate_access_key();
        let now = chrono::Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        active.access_key = Set(Some(new_key.clone()));
        active.updated_at = Set(now);
        active.update(&self.conn).await?;

        Ok(new_key)
    }

    /// Add a role to a user. Returns false when the user already had it.
    pub async fn grant_role(&self, username: &str, role: &str) -> Result<bool> {
        let user = self
            .find_model(username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {username}"))?;

        let mut roles = split_roles(&user.roles);
        if roles.iter().any(|r| r == role) {
            return Ok(false);
        }
        roles.push(role.to_string());

        let mut active: users::ActiveModel = user.into();
        active.roles = Set(join_roles(&roles));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(true)
    }
}

/// Generate a random access key (64 character hex string)
#[must_use]
pub fn generate_access_key() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    async fn repo() -> UserRepository {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        UserRepository::new(store.conn)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let repo = repo().await;

        let first = repo
            .get_or_create("jdoe", "Jane Doe", &["report-viewer".to_string()])
            .await
            .unwrap();
        let second = repo.get_or_create("jdoe", "Someone Else", &[]).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.fullname, "Jane Doe");
        assert_eq!(second.roles, vec!["report-viewer".to_string()]);

        let count = users::Entity::find().all(&repo.conn).await.unwrap().len();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn regenerated_access_key_authenticates() {
        let repo = repo().await;
        repo.get_or_create("jdoe", "Jane Doe", &[]).await.unwrap();

        let key = repo.regenerate_access_key("jdoe").await.unwrap();
        assert_eq!(key.len(), 64);

        let user = repo.verify_access_key(&key).await.unwrap().unwrap();
        assert_eq!(user.username, "jdoe");

        let newer = repo.regenerate_access_key("jdoe").await.unwrap();
        assert_ne!(key, newer);
        assert!(repo.verify_access_key(&key).await.unwrap().is_none());
        assert!(repo.verify_access_key("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn grant_role_adds_once() {
        let repo = repo().await;
        repo.get_or_create("jdoe", "Jane Doe", &[]).await.unwrap();

        assert!(repo.grant_role("jdoe", "admin").await.unwrap());
        assert!(!repo.grant_role("jdoe", "admin").await.unwrap());

        let user = repo.get_by_username("jdoe").await.unwrap().unwrap();
        assert!(user.has_role("admin"));
        assert!(user.has_any_role(&["admin", "report-viewer"]));
        assert!(!user.has_role("report-viewer"));
    }

    #[test]
    fn roles_round_trip_through_column() {
        let roles = split_roles(" admin, ,report-viewer,admin ");
        assert_eq!(roles, vec!["admin", "report-viewer", "admin"]);
        assert_eq!(join_roles(&roles), "admin,report-viewer");
    }
}
