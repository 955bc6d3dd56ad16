//! Credential verification and local user provisioning.
//!
//! The backend is picked once at startup from `[auth].backend` and carried in
//! the shared state as an [`Authenticator`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::config::AuthConfig;
use crate::constants::roles;
use crate::db::{Store, User};

use super::auth_demo::DemoVerifier;
use super::auth_ldap::LdapVerifier;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Wrong user/password combination!")]
    InvalidCredentials,

    #[error("Error authenticating with LDAP server")]
    Directory(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginBackend {
    Ldap,
    Demo,
}

impl FromStr for LoginBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ldap" => Ok(Self::Ldap),
            "demo" => Ok(Self::Demo),
            other => Err(anyhow::anyhow!("Unsupported login backend: {other}")),
        }
    }
}

impl fmt::Display for LoginBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ldap => write!(f, "ldap"),
            Self::Demo => write!(f, "demo"),
        }
    }
}

/// Identity confirmed by a credential backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub username: String,
    pub display_name: String,
}

#[async_trait::async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Checks the credentials against the backend.
    ///
    /// # Errors
    ///
    /// Any failure to confirm the credentials is an error.
    async fn verify(&self, username: &str, password: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// Selected credential backend plus user provisioning.
#[derive(Clone)]
pub struct Authenticator {
    backend: LoginBackend,
    verifier: Arc<dyn CredentialVerifier>,
    store: Store,
    default_roles: Vec<String>,
    admin_users: Vec<String>,
}

impl Authenticator {
    pub fn from_config(config: &AuthConfig, store: Store) -> anyhow::Result<Self> {
        let backend = config.login_backend()?;

        let verifier: Arc<dyn CredentialVerifier> = match backend {
            LoginBackend::Ldap => Arc::new(LdapVerifier::new(config.ldap.clone())),
            LoginBackend::Demo => Arc::new(DemoVerifier),
        };

        tracing::info!(backend = %backend, "Login backend initialized");

        Ok(Self {
            backend,
            verifier,
            store,
            default_roles: config.default_roles.clone(),
            admin_users: config.admin_users.clone(),
        })
    }

    #[must_use]
    pub const fn backend(&self) -> LoginBackend {
        self.backend
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let identity = self.verifier.verify(username, password).await?;
        self.provision(&identity).await
    }

    /// Returns the local user for a verified identity, creating it on first login.
    pub async fn provision(&self, identity: &VerifiedIdentity) -> Result<User, AuthError> {
        let mut initial_roles = self.default_roles.clone();
        if self.admin_users.iter().any(|u| u == &identity.username) {
            initial_roles.push(roles::ADMIN.to_string());
        }

        let user = self
            .store
            .get_or_add_user(&identity.username, &identity.display_name, &initial_roles)
            .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::demo;
    use sea_orm::EntityTrait;

    async fn demo_authenticator(config: AuthConfig) -> Authenticator {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        Authenticator::from_config(&config, store).unwrap()
    }

    fn demo_config() -> AuthConfig {
        AuthConfig {
            backend: "demo".to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn parses_supported_backends() {
        assert_eq!("ldap".parse::<LoginBackend>().unwrap(), LoginBackend::Ldap);
        assert_eq!("demo".parse::<LoginBackend>().unwrap(), LoginBackend::Demo);

        let err = "LDAP".parse::<LoginBackend>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported login backend: LDAP");
    }

    #[tokio::test]
    async fn unsupported_backend_is_rejected_at_startup() {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        let config = AuthConfig {
            backend: "oauth".to_string(),
            ..AuthConfig::default()
        };

        assert!(Authenticator::from_config(&config, store).is_err());
    }

    #[tokio::test]
    async fn demo_credentials_provision_a_user() {
        let auth = demo_authenticator(demo_config()).await;
        assert_eq!(auth.backend(), LoginBackend::Demo);

        let user = auth
            .authenticate(demo::USERNAME, demo::PASSWORD)
            .await
            .unwrap();
        assert_eq!(user.username, demo::USERNAME);
        assert_eq!(user.fullname, demo::DISPLAY_NAME);

        let again = auth
            .authenticate(demo::USERNAME, demo::PASSWORD)
            .await
            .unwrap();
        assert_eq!(user.id, again.id);
    }

    #[tokio::test]
    async fn demo_rejects_anything_else() {
        let auth = demo_authenticator(demo_config()).await;

        for (username, password) in [
            (demo::USERNAME, "wrong"),
            ("someone@dataplate.io", demo::PASSWORD),
            ("", ""),
        ] {
            let err = auth.authenticate(username, password).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
            assert_eq!(err.to_string(), "Wrong user/password combination!");
        }
    }

    #[tokio::test]
    async fn first_login_assigns_configured_roles() {
        let mut config = demo_config();
        config.default_roles = vec![roles::REPORT_VIEWER.to_string()];
        config.admin_users = vec![demo::USERNAME.to_string()];
        let auth = demo_authenticator(config).await;

        let user = auth
            .authenticate(demo::USERNAME, demo::PASSWORD)
            .await
            .unwrap();
        assert!(user.has_role(roles::REPORT_VIEWER));
        assert!(user.has_role(roles::ADMIN));
    }

    #[tokio::test]
    async fn concurrent_first_logins_share_one_user() {
        let dir = std::env::temp_dir().join(format!("dataplate-auth-{}", uuid::Uuid::new_v4()));
        let url = format!("sqlite:{}", dir.join("users.db").display());
        let store = Store::with_pool_options(&url, 8, 1).await.unwrap();
        let auth = Authenticator::from_config(&demo_config(), store.clone()).unwrap();

        for round in 0..5 {
            let identity = VerifiedIdentity {
                username: format!("user{round}@dataplate.io"),
                display_name: format!("User {round}"),
            };

            let mut tasks = tokio::task::JoinSet::new();
            for _ in 0..8 {
                let auth = auth.clone();
                let identity = identity.clone();
                tasks.spawn(async move { auth.provision(&identity).await });
            }

            let mut ids = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                ids.push(joined.unwrap().unwrap().id);
            }
            ids.dedup();
            assert_eq!(ids.len(), 1, "round {round}");
        }

        let count = crate::entities::users::Entity::find()
            .all(&store.conn)
            .await
            .unwrap()
            .len();
        assert_eq!(count, 5);

        std::fs::remove_dir_all(&dir).ok();
    }
}
